use std::hash::Hash;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};

use crate::address::InternalAddress;
use crate::bits::{BitBuilder, BitReader, BitString};
use crate::cell::{Builder, Cell, CellRef, Slice};
use crate::dict::Dictionary;
use crate::error::Result;

/// Encodes a key into the fixed-width [`BitString`] a dictionary stores it
/// as. `Arc` rather than a bare `fn` pointer (the teacher's
/// `KeyReader`/`ValReader` convention) so a width-parameterized coder like
/// [`key_writer_uint`] can close over its bit width, and so a coder built
/// once (e.g. for a nested dictionary's element type) can be cheaply shared
/// across every entry that needs it rather than rebuilt per call.
pub type KeyWriter<K> = Arc<dyn Fn(&K) -> Result<BitString> + Send + Sync>;
pub type KeyReader<K> = Arc<dyn Fn(&BitString) -> Result<K> + Send + Sync>;
pub type ValueWriter<V> = Arc<dyn Fn(&mut Builder, &V) -> Result<()> + Send + Sync>;
pub type ValueReader<V> = Arc<dyn Fn(&mut Slice) -> Result<V> + Send + Sync>;

pub fn key_writer_u8(key: &u8) -> Result<BitString> {
    BitString::from_bytes(vec![*key], 8)
}

pub fn key_reader_u8(bits: &BitString) -> Result<u8> {
    Ok(bits.subbuffer(0, 8)?[0])
}

pub fn key_writer_u16(key: &u16) -> Result<BitString> {
    BitString::from_bytes(key.to_be_bytes().to_vec(), 16)
}

pub fn key_reader_u16(bits: &BitString) -> Result<u16> {
    let bytes = bits.subbuffer(0, 16)?;
    Ok(u16::from_be_bytes(bytes.try_into().expect("16 bits is 2 bytes")))
}

pub fn key_writer_u32(key: &u32) -> Result<BitString> {
    BitString::from_bytes(key.to_be_bytes().to_vec(), 32)
}

pub fn key_reader_u32(bits: &BitString) -> Result<u32> {
    let bytes = bits.subbuffer(0, 32)?;
    Ok(u32::from_be_bytes(bytes.try_into().expect("32 bits is 4 bytes")))
}

pub fn key_writer_u64(key: &u64) -> Result<BitString> {
    BitString::from_bytes(key.to_be_bytes().to_vec(), 64)
}

pub fn key_reader_u64(bits: &BitString) -> Result<u64> {
    let bytes = bits.subbuffer(0, 64)?;
    Ok(u64::from_be_bytes(bytes.try_into().expect("64 bits is 8 bytes")))
}

/// 256-bit key, the width used for account-id and cell-hash-keyed
/// dictionaries (`ConfigParam`, `ShardAccounts`, library dicts).
pub fn key_writer_hash(key: &[u8; 32]) -> Result<BitString> {
    BitString::from_bytes(key.to_vec(), 256)
}

pub fn key_reader_hash(bits: &BitString) -> Result<[u8; 32]> {
    let bytes = bits.subbuffer(0, 256)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A `BigUint` key exactly `bits` wide.
pub fn key_writer_uint(bits: usize) -> impl Fn(&BigUint) -> Result<BitString> {
    move |key: &BigUint| {
        let mut b = BitBuilder::with_capacity(bits);
        b.write_uint(key, bits)?;
        b.build()
    }
}

pub fn key_reader_uint(bits: usize) -> impl Fn(&BitString) -> Result<BigUint> {
    move |value: &BitString| {
        let mut r = BitReader::new(value.clone());
        r.load_uint(bits)
    }
}

/// A signed `BigInt` key exactly `bits` wide.
pub fn key_writer_int(bits: usize) -> impl Fn(&BigInt) -> Result<BitString> {
    move |key: &BigInt| {
        let mut b = BitBuilder::with_capacity(bits);
        b.write_int(key, bits)?;
        b.build()
    }
}

pub fn key_reader_int(bits: usize) -> impl Fn(&BitString) -> Result<BigInt> {
    move |value: &BitString| {
        let mut r = BitReader::new(value.clone());
        r.load_int(bits)
    }
}

/// A raw workchain+hash key: `addr_std` without the tag/anycast bits, the
/// 264-bit form used by account-id-keyed dictionaries.
pub fn key_writer_address(key: &InternalAddress) -> Result<BitString> {
    let mut b = BitBuilder::with_capacity(264);
    b.write_i64(key.workchain as i64, 8)?;
    b.write_buffer(&key.hash)?;
    b.build()
}

pub fn key_reader_address(bits: &BitString) -> Result<InternalAddress> {
    let mut r = BitReader::new(bits.clone());
    let workchain = r.load_i64(8)? as i8;
    let hash_bytes = r.load_buffer(32)?;
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hash_bytes);
    Ok(InternalAddress::new(workchain, hash))
}

/// A fixed `n`-byte buffer key.
pub fn key_writer_buffer(n: usize) -> impl Fn(&Vec<u8>) -> Result<BitString> {
    move |key: &Vec<u8>| BitString::from_bytes(key.clone(), n * 8)
}

pub fn key_reader_buffer(n: usize) -> impl Fn(&BitString) -> Result<Vec<u8>> {
    move |value: &BitString| value.subbuffer(0, n * 8)
}

/// A raw `n`-bit key, stored and read back as a [`BitString`] with no
/// further interpretation.
pub fn key_writer_bitstring(_n: usize) -> impl Fn(&BitString) -> Result<BitString> {
    |key: &BitString| Ok(key.clone())
}

pub fn key_reader_bitstring(n: usize) -> impl Fn(&BitString) -> Result<BitString> {
    move |value: &BitString| value.substring(0, n)
}

pub fn value_writer_ref(builder: &mut Builder, value: &CellRef) -> Result<()> {
    builder.store_ref(value.clone())?;
    Ok(())
}

pub fn value_reader_ref(slice: &mut Slice) -> Result<CellRef> {
    Ok(slice.load_ref()?.clone())
}

/// Writes a `BigUint` in the fewest bits that fit it (at least 1), with no
/// length prefix — meant for a value that is the whole, sole contents of
/// its leaf cell, paired with [`value_reader_uint`].
pub fn value_writer_uint_min(builder: &mut Builder, value: &BigUint) -> Result<()> {
    let bits = value.bits().max(1) as usize;
    builder.store_uint(value, bits)?;
    Ok(())
}

pub fn value_reader_uint(slice: &mut Slice) -> Result<BigUint> {
    let bits = slice.remaining_bits();
    slice.load_uint(bits)
}

/// Writes a `BigUint` value in exactly `bits` bits, for dictionaries whose
/// values share a known fixed width.
pub fn value_writer_uint(bits: usize) -> impl Fn(&mut Builder, &BigUint) -> Result<()> {
    move |builder: &mut Builder, value: &BigUint| {
        builder.store_uint(value, bits)?;
        Ok(())
    }
}

pub fn value_reader_uint_fixed(bits: usize) -> impl Fn(&mut Slice) -> Result<BigUint> {
    move |slice: &mut Slice| slice.load_uint(bits)
}

/// Writes a `BigInt` in the fewest bits that fit it (at least 1), mirroring
/// [`value_writer_uint_min`] for signed values.
pub fn value_writer_int_min(builder: &mut Builder, value: &BigInt) -> Result<()> {
    let bits = value.bits().max(1) as usize;
    builder.store_int(value, bits)?;
    Ok(())
}

pub fn value_reader_int(slice: &mut Slice) -> Result<BigInt> {
    let bits = slice.remaining_bits();
    slice.load_int(bits)
}

/// Writes a `BigInt` value in exactly `bits` bits.
pub fn value_writer_int(bits: usize) -> impl Fn(&mut Builder, &BigInt) -> Result<()> {
    move |builder: &mut Builder, value: &BigInt| {
        builder.store_int(value, bits)?;
        Ok(())
    }
}

pub fn value_reader_int_fixed(bits: usize) -> impl Fn(&mut Slice) -> Result<BigInt> {
    move |slice: &mut Slice| slice.load_int(bits)
}

pub fn value_writer_bool(builder: &mut Builder, value: &bool) -> Result<()> {
    builder.store_bit(*value)?;
    Ok(())
}

pub fn value_reader_bool(slice: &mut Slice) -> Result<bool> {
    slice.load_bit()
}

pub fn value_writer_coins(builder: &mut Builder, value: &BigUint) -> Result<()> {
    builder.store_coins(value)?;
    Ok(())
}

pub fn value_reader_coins(slice: &mut Slice) -> Result<BigUint> {
    slice.load_coins()
}

/// `VarUint(header_bits)`: a length-prefixed unsigned value, the general
/// form `coins` specializes with a 4-bit header.
pub fn value_writer_varuint(header_bits: usize) -> impl Fn(&mut Builder, &BigUint) -> Result<()> {
    move |builder: &mut Builder, value: &BigUint| {
        builder.store_var_uint(value, header_bits)?;
        Ok(())
    }
}

pub fn value_reader_varuint(header_bits: usize) -> impl Fn(&mut Slice) -> Result<BigUint> {
    move |slice: &mut Slice| slice.load_var_uint(header_bits)
}

/// Stores a whole [`Cell`]'s bits and references inline, as the sole content
/// of the value's own leaf cell (as opposed to [`value_writer_ref`], which
/// stores it behind a reference).
pub fn value_writer_cell(builder: &mut Builder, value: &Cell) -> Result<()> {
    builder.store_cell(value)?;
    Ok(())
}

pub fn value_reader_cell(slice: &mut Slice) -> Result<Cell> {
    slice.clone_from_start()?.as_cell()
}

/// A fixed `n`-byte buffer value.
pub fn value_writer_buffer(n: usize) -> impl Fn(&mut Builder, &Vec<u8>) -> Result<()> {
    move |builder: &mut Builder, value: &Vec<u8>| {
        debug_assert_eq!(value.len(), n);
        builder.store_buffer(value)?;
        Ok(())
    }
}

pub fn value_reader_buffer(n: usize) -> impl Fn(&mut Slice) -> Result<Vec<u8>> {
    move |slice: &mut Slice| slice.load_buffer(n)
}

pub fn value_writer_address(
    builder: &mut Builder,
    value: &crate::address::Address,
) -> Result<()> {
    builder.store_address(value)?;
    Ok(())
}

pub fn value_reader_address(slice: &mut Slice) -> Result<crate::address::Address> {
    slice.load_address()
}

/// A raw `n`-bit value, stored and read back as a [`BitString`].
pub fn value_writer_bitstring(builder: &mut Builder, value: &BitString) -> Result<()> {
    builder.store_bits(value)?;
    Ok(())
}

pub fn value_reader_bitstring(n: usize) -> impl Fn(&mut Slice) -> Result<BitString> {
    move |slice: &mut Slice| slice.load_bits(n)
}

/// A dictionary nested as another dictionary's value, stored/read through
/// the same `HashmapE` presence-bit shape [`Dictionary::store`] already uses.
pub fn value_writer_nested_dict<K2, V2>(
    builder: &mut Builder,
    value: &Dictionary<K2, V2>,
) -> Result<()>
where
    K2: Eq + Hash,
    V2: Clone,
{
    value.store(builder)
}

pub fn value_reader_nested_dict<K2, V2>(
    key_len_bits: usize,
    key_writer: KeyWriter<K2>,
    key_reader: KeyReader<K2>,
    value_writer: ValueWriter<V2>,
    value_reader: ValueReader<V2>,
) -> impl Fn(&mut Slice) -> Result<Dictionary<K2, V2>>
where
    K2: Eq + Hash,
{
    move |slice: &mut Slice| {
        Dictionary::load(
            slice,
            key_len_bits,
            key_writer.clone(),
            key_reader.clone(),
            value_writer.clone(),
            value_reader.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_key_round_trips_negative_values() {
        let writer = key_writer_int(16);
        let reader = key_reader_int(16);
        let bits = writer(&BigInt::from(-1234)).unwrap();
        assert_eq!(reader(&bits).unwrap(), BigInt::from(-1234));
    }

    #[test]
    fn address_key_round_trips_workchain_and_hash() {
        let addr = InternalAddress::new(-1, [0x7u8; 32]);
        let bits = key_writer_address(&addr).unwrap();
        assert_eq!(key_reader_address(&bits).unwrap(), addr);
    }

    #[test]
    fn buffer_key_round_trips() {
        let writer = key_writer_buffer(4);
        let reader = key_reader_buffer(4);
        let value = vec![1u8, 2, 3, 4];
        let bits = writer(&value).unwrap();
        assert_eq!(reader(&bits).unwrap(), value);
    }

    #[test]
    fn bitstring_key_is_passed_through_unchanged() {
        let mut b = BitBuilder::with_capacity(3);
        b.write_bit(true).unwrap();
        b.write_bit(false).unwrap();
        b.write_bit(true).unwrap();
        let key = b.build().unwrap();
        let writer = key_writer_bitstring(3);
        let reader = key_reader_bitstring(3);
        let bits = writer(&key).unwrap();
        assert_eq!(reader(&bits).unwrap(), key);
    }

    #[test]
    fn bool_value_round_trips() {
        let mut b = Builder::new();
        value_writer_bool(&mut b, &true).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        assert!(value_reader_bool(&mut s).unwrap());
    }

    #[test]
    fn coins_value_round_trips() {
        let mut b = Builder::new();
        value_writer_coins(&mut b, &BigUint::from(1_000_000u64)).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        assert_eq!(value_reader_coins(&mut s).unwrap(), BigUint::from(1_000_000u64));
    }

    #[test]
    fn varuint_value_round_trips_with_custom_header() {
        let writer = value_writer_varuint(5);
        let reader = value_reader_varuint(5);
        let mut b = Builder::new();
        writer(&mut b, &BigUint::from(987654u64)).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        assert_eq!(reader(&mut s).unwrap(), BigUint::from(987654u64));
    }

    #[test]
    fn inline_cell_value_round_trips_without_a_reference() {
        let mut inner = Builder::new();
        inner.store_u64(99, 8).unwrap();
        let inner_cell = inner.end_cell().unwrap();

        let mut b = Builder::new();
        value_writer_cell(&mut b, &inner_cell).unwrap();
        let cell = b.end_cell().unwrap();
        assert!(cell.references().is_empty());

        let mut s = Slice::new(&cell).unwrap();
        let read_back = value_reader_cell(&mut s).unwrap();
        assert_eq!(read_back.data(), inner_cell.data());
        assert_eq!(read_back.bit_len(), inner_cell.bit_len());
    }

    #[test]
    fn buffer_value_round_trips() {
        let writer = value_writer_buffer(3);
        let reader = value_reader_buffer(3);
        let mut b = Builder::new();
        writer(&mut b, &vec![9u8, 8, 7]).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        assert_eq!(reader(&mut s).unwrap(), vec![9u8, 8, 7]);
    }

    #[test]
    fn bitstring_value_round_trips() {
        let mut bb = BitBuilder::with_capacity(5);
        bb.write_uint(&BigUint::from(0b10110u32), 5).unwrap();
        let value = bb.build().unwrap();

        let mut b = Builder::new();
        value_writer_bitstring(&mut b, &value).unwrap();
        let cell = b.end_cell().unwrap();
        let reader = value_reader_bitstring(5);
        let mut s = Slice::new(&cell).unwrap();
        assert_eq!(reader(&mut s).unwrap(), value);
    }

    #[test]
    fn nested_dictionary_round_trips_through_a_parent_value() {
        let mut inner: Dictionary<u16, BigUint> = Dictionary::empty(
            16,
            Arc::new(key_writer_u16),
            Arc::new(key_reader_u16),
            Arc::new(value_writer_uint_min),
            Arc::new(value_reader_uint),
        );
        inner.set(1, BigUint::from(7u32));
        inner.set(2, BigUint::from(8u32));

        let mut parent: Dictionary<u16, Dictionary<u16, BigUint>> = Dictionary::empty(
            16,
            Arc::new(key_writer_u16),
            Arc::new(key_reader_u16),
            Arc::new(value_writer_nested_dict::<u16, BigUint>),
            Arc::new(value_reader_nested_dict(
                16,
                Arc::new(key_writer_u16),
                Arc::new(key_reader_u16),
                Arc::new(value_writer_uint_min),
                Arc::new(value_reader_uint),
            )),
        );
        parent.set(100, inner);

        let mut b = Builder::new();
        parent.store(&mut b).unwrap();
        let cell = b.end_cell().unwrap();

        let mut s = Slice::new(&cell).unwrap();
        let loaded: Dictionary<u16, Dictionary<u16, BigUint>> = Dictionary::load(
            &mut s,
            16,
            Arc::new(key_writer_u16),
            Arc::new(key_reader_u16),
            Arc::new(value_writer_nested_dict::<u16, BigUint>),
            Arc::new(value_reader_nested_dict(
                16,
                Arc::new(key_writer_u16),
                Arc::new(key_reader_u16),
                Arc::new(value_writer_uint_min),
                Arc::new(value_reader_uint),
            )),
        )
        .unwrap();

        let loaded_inner = loaded.get(&100).unwrap();
        assert_eq!(loaded_inner.get(&1), Some(&BigUint::from(7u32)));
        assert_eq!(loaded_inner.get(&2), Some(&BigUint::from(8u32)));
    }
}
