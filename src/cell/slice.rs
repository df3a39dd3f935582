use std::hash::Hash;

use num_bigint::{BigInt, BigUint};

use crate::address::Address;
use crate::bits::{BitReader, BitString};
use crate::cell::{Builder, Cell, CellRef};
use crate::dict::coders::{KeyReader, KeyWriter, ValueReader, ValueWriter};
use crate::dict::Dictionary;
use crate::error::{CellError, Result};

/// A read cursor into an existing [`Cell`]: bits are consumed through a
/// [`BitReader`] over the cell's data, and references are consumed
/// independently through their own index, mirroring the way a cell
/// separates its data bits from its reference list.
pub struct Slice<'a> {
    cell: &'a Cell,
    bits: BitReader,
    next_ref: usize,
}

impl<'a> Slice<'a> {
    pub fn new(cell: &'a Cell) -> Result<Self> {
        let bits = BitString::from_bytes(cell.data().to_vec(), cell.bit_len())?;
        Ok(Slice {
            cell,
            bits: BitReader::new(bits),
            next_ref: 0,
        })
    }

    pub fn remaining_bits(&self) -> usize {
        self.bits.remaining()
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.references().len() - self.next_ref
    }

    pub fn save(&mut self) {
        self.bits.save();
    }

    pub fn reset(&mut self) {
        self.bits.reset();
    }

    pub fn skip(&mut self, bits: usize) -> Result<()> {
        self.bits.skip(bits)
    }

    /// A fresh cursor over the same cell, rewound to the start.
    pub fn clone_from_start(&self) -> Result<Slice<'a>> {
        Slice::new(self.cell)
    }

    pub fn load_bit(&mut self) -> Result<bool> {
        self.bits.load_bit()
    }

    pub fn preload_bit(&self) -> Result<bool> {
        self.bits.preload_bit()
    }

    pub fn load_bits(&mut self, bits: usize) -> Result<BitString> {
        self.bits.load_bits(bits)
    }

    pub fn preload_bits(&self, bits: usize) -> Result<BitString> {
        self.bits.preload_bits(bits)
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<BigUint> {
        self.bits.load_uint(bits)
    }

    pub fn preload_uint(&self, bits: usize) -> Result<BigUint> {
        self.bits.preload_uint(bits)
    }

    pub fn load_u64(&mut self, bits: usize) -> Result<u64> {
        self.bits.load_u64(bits)
    }

    pub fn load_int(&mut self, bits: usize) -> Result<BigInt> {
        self.bits.load_int(bits)
    }

    pub fn load_i64(&mut self, bits: usize) -> Result<i64> {
        self.bits.load_i64(bits)
    }

    pub fn load_var_uint(&mut self, header_bits: usize) -> Result<BigUint> {
        self.bits.load_var_uint(header_bits)
    }

    pub fn load_var_int(&mut self, header_bits: usize) -> Result<BigInt> {
        self.bits.load_var_int(header_bits)
    }

    pub fn load_coins(&mut self) -> Result<BigUint> {
        self.bits.load_coins()
    }

    pub fn load_buffer(&mut self, bytes: usize) -> Result<Vec<u8>> {
        self.bits.load_buffer(bytes)
    }

    pub fn load_address(&mut self) -> Result<Address> {
        self.bits.load_address()
    }

    pub fn load_ref(&mut self) -> Result<&'a CellRef> {
        let cell = self.preload_ref()?;
        self.next_ref += 1;
        Ok(cell)
    }

    pub fn preload_ref(&self) -> Result<&'a CellRef> {
        self.cell.references().get(self.next_ref).ok_or(CellError::OutOfBounds {
            offset: self.next_ref,
            length: 1,
            len: self.cell.references().len(),
        })
    }

    /// Reads the remaining bytes as a "snake format" byte string: the
    /// current cell's tail plus, recursively, the single reference chain
    /// written by [`crate::cell::Builder::store_buffer_tail`].
    pub fn load_buffer_tail(&mut self) -> Result<Vec<u8>> {
        let mut out = self.load_buffer(self.remaining_bits() / 8)?;
        if self.remaining_refs() > 0 {
            let next = self.load_ref()?.clone();
            let mut rest = Slice::new(next.as_ref())?.load_buffer_tail_owned()?;
            out.append(&mut rest);
        }
        Ok(out)
    }

    pub fn load_string_tail(&mut self) -> Result<String> {
        let bytes = self.load_buffer_tail()?;
        String::from_utf8(bytes).map_err(|e| CellError::invalid_exotic(format!("invalid utf8: {e}")))
    }

    fn load_buffer_tail_owned(mut self) -> Result<Vec<u8>> {
        self.load_buffer_tail()
    }

    pub fn load_dict<K: Eq + Hash, V>(
        &mut self,
        key_len_bits: usize,
        key_writer: KeyWriter<K>,
        key_reader: KeyReader<K>,
        value_writer: ValueWriter<V>,
        value_reader: ValueReader<V>,
    ) -> Result<Dictionary<K, V>> {
        Dictionary::load(
            self,
            key_len_bits,
            key_writer,
            key_reader,
            value_writer,
            value_reader,
        )
    }

    pub fn load_dict_direct<K: Eq + Hash, V>(
        &mut self,
        key_len_bits: usize,
        key_writer: KeyWriter<K>,
        key_reader: KeyReader<K>,
        value_writer: ValueWriter<V>,
        value_reader: ValueReader<V>,
    ) -> Result<Dictionary<K, V>> {
        Dictionary::load_direct(
            self,
            key_len_bits,
            key_writer,
            key_reader,
            value_writer,
            value_reader,
        )
    }

    /// Converts everything remaining in this slice into a `Builder`
    /// pre-loaded with its bits and references, consuming the slice.
    pub fn as_builder(mut self) -> Result<Builder> {
        let mut builder = Builder::new();
        builder.store_slice(&mut self)?;
        Ok(builder)
    }

    /// Converts everything remaining in this slice into a freshly built
    /// [`Cell`], consuming the slice.
    pub fn as_cell(self) -> Result<Cell> {
        self.as_builder()?.end_cell()
    }

    /// Fails unless every bit and reference has been consumed.
    pub fn end_parse(self) -> Result<()> {
        let remaining_bits = self.remaining_bits();
        let remaining_refs = self.remaining_refs();
        if remaining_bits != 0 || remaining_refs != 0 {
            return Err(CellError::NotEmptySlice {
                remaining_bits,
                remaining_refs,
            });
        }
        Ok(())
    }

    pub fn is_exhausted(&self) -> bool {
        self.bits.is_exhausted() && self.remaining_refs() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Builder;

    #[test]
    fn reads_back_what_was_written() {
        let mut b = Builder::new();
        b.store_u64(42, 16).unwrap();
        let child = Builder::new().end_cell().unwrap().to_arc();
        b.store_ref(child).unwrap();
        let cell = b.end_cell().unwrap();

        let mut s = Slice::new(&cell).unwrap();
        assert_eq!(s.load_u64(16).unwrap(), 42);
        assert!(s.load_ref().is_ok());
        s.end_parse().unwrap();
    }

    #[test]
    fn end_parse_rejects_leftovers() {
        let mut b = Builder::new();
        b.store_u64(1, 8).unwrap();
        let cell = b.end_cell().unwrap();
        let s = Slice::new(&cell).unwrap();
        assert!(s.end_parse().is_err());
    }
}
