use num_bigint::{BigInt, BigUint};

use crate::address::Address;
use crate::bits::{BitBuilder, BitString};
use crate::cell::{Cell, CellRef, Slice};
use crate::error::{CellError, Result};

const MAX_CELL_BITS: usize = 1023;
const MAX_CELL_REFERENCES: usize = 4;

/// Accumulates bits and child references for a single [`Cell`]. Numeric and
/// bit-level writes delegate to [`BitBuilder`]; reference bookkeeping and
/// the final [`Cell::new`] validation are this type's own job.
pub struct Builder {
    bits: BitBuilder,
    references: Vec<CellRef>,
    exotic: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            bits: BitBuilder::with_capacity(MAX_CELL_BITS),
            references: Vec::new(),
            exotic: false,
        }
    }

    pub fn set_exotic(&mut self, exotic: bool) -> &mut Self {
        self.exotic = exotic;
        self
    }

    pub fn remaining_bits(&self) -> usize {
        self.bits.remaining_capacity()
    }

    pub fn remaining_refs(&self) -> usize {
        MAX_CELL_REFERENCES - self.references.len()
    }

    pub fn store_bit(&mut self, value: bool) -> Result<&mut Self> {
        self.bits.write_bit(value)?;
        Ok(self)
    }

    pub fn store_uint(&mut self, value: &BigUint, bits: usize) -> Result<&mut Self> {
        self.bits.write_uint(value, bits)?;
        Ok(self)
    }

    pub fn store_u64(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        self.bits.write_u64(value, bits)?;
        Ok(self)
    }

    pub fn store_int(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        self.bits.write_int(value, bits)?;
        Ok(self)
    }

    pub fn store_i64(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        self.bits.write_i64(value, bits)?;
        Ok(self)
    }

    pub fn store_var_uint(&mut self, value: &BigUint, header_bits: usize) -> Result<&mut Self> {
        self.bits.write_var_uint(value, header_bits)?;
        Ok(self)
    }

    pub fn store_var_int(&mut self, value: &BigInt, header_bits: usize) -> Result<&mut Self> {
        self.bits.write_var_int(value, header_bits)?;
        Ok(self)
    }

    pub fn store_coins(&mut self, amount: &BigUint) -> Result<&mut Self> {
        self.bits.write_coins(amount)?;
        Ok(self)
    }

    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self> {
        self.bits.write_address(address)?;
        Ok(self)
    }

    pub fn store_bits(&mut self, bits: &BitString) -> Result<&mut Self> {
        self.bits.write_bits(bits)?;
        Ok(self)
    }

    pub fn store_buffer(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.bits.write_buffer(bytes)?;
        Ok(self)
    }

    /// Writes `value` only if `Some`, preceded by a presence bit — the
    /// `Maybe` TL-B combinator applied to any scalar writer.
    pub fn store_maybe<T>(
        &mut self,
        value: Option<&T>,
        write: impl FnOnce(&mut Builder, &T) -> Result<()>,
    ) -> Result<&mut Self> {
        match value {
            Some(v) => {
                self.store_bit(true)?;
                write(self, v)?;
            }
            None => {
                self.store_bit(false)?;
            }
        }
        Ok(self)
    }

    pub fn store_ref(&mut self, cell: CellRef) -> Result<&mut Self> {
        if self.references.len() >= MAX_CELL_REFERENCES {
            return Err(CellError::RefOverflow {
                index: self.references.len(),
            });
        }
        self.references.push(cell);
        Ok(self)
    }

    pub fn store_refs(&mut self, cells: impl IntoIterator<Item = CellRef>) -> Result<&mut Self> {
        for cell in cells {
            self.store_ref(cell)?;
        }
        Ok(self)
    }

    /// Stores an existing cell's bits and references inline, as if they had
    /// been written directly into this builder.
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self> {
        let bits = BitString::from_bytes(cell.data().to_vec(), cell.bit_len())?;
        self.store_bits(&bits)?;
        self.store_refs(cell.references().iter().cloned())?;
        Ok(self)
    }

    /// Copies everything remaining in `slice` — bits and references alike —
    /// into this builder, consuming it from the slice.
    pub fn store_slice(&mut self, slice: &mut Slice) -> Result<&mut Self> {
        let remaining_bits = slice.remaining_bits();
        let bits = slice.load_bits(remaining_bits)?;
        self.store_bits(&bits)?;
        while slice.remaining_refs() > 0 {
            let r = slice.load_ref()?.clone();
            self.store_ref(r)?;
        }
        Ok(self)
    }

    /// Finalizes `other` and inlines its bits and references here, as if
    /// `other`'s cell had been sliced and stored directly.
    pub fn store_builder(&mut self, other: &mut Builder) -> Result<&mut Self> {
        let cell = other.end_cell()?;
        self.store_cell(&cell)
    }

    /// `HashmapE` presence bit plus the root cell reference, when present.
    pub fn store_dict(&mut self, root: Option<&CellRef>) -> Result<&mut Self> {
        self.store_maybe(root, |b, cell| {
            b.store_ref((*cell).clone())?;
            Ok(())
        })
    }

    /// Stores the dictionary root directly, without a presence bit — for
    /// contexts that already guarantee a non-empty dictionary.
    pub fn store_dict_direct(&mut self, root: CellRef) -> Result<&mut Self> {
        self.store_ref(root)
    }

    /// Writes as many bytes as fit in the remaining capacity of this cell,
    /// spilling the rest into a chain of single-ref child cells (the "snake
    /// format" used for data too large for one cell).
    pub fn store_buffer_tail(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let avail_bytes = self.remaining_bits() / 8;
        let take = avail_bytes.min(bytes.len());
        self.store_buffer(&bytes[..take])?;
        let rest = &bytes[take..];
        if !rest.is_empty() {
            let mut child = Builder::new();
            child.store_buffer_tail(rest)?;
            let child_cell = child.end_cell()?;
            self.store_ref(child_cell.to_arc())?;
        }
        Ok(self)
    }

    pub fn store_string_tail(&mut self, s: &str) -> Result<&mut Self> {
        self.store_buffer_tail(s.as_bytes())
    }

    /// Finalizes the accumulated bits and references into an immutable
    /// [`Cell`], validating bit and reference limits.
    pub fn end_cell(&mut self) -> Result<Cell> {
        let bits = std::mem::replace(&mut self.bits, BitBuilder::with_capacity(MAX_CELL_BITS));
        let references = std::mem::take(&mut self.references);
        let exotic = std::mem::take(&mut self.exotic);
        let built = bits.build()?;
        let bit_len = built.len();
        let data = built.to_zero_padded_bytes();
        if exotic {
            Cell::new_exotic(data, bit_len, references)
        } else {
            Cell::new(data, bit_len, references)
        }
    }
}
