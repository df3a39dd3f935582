use bitstream_io::{BigEndian, BitWrite, BitWriter};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, Zero};

use crate::address::{Address, InternalAddress};
use crate::bits::BitString;
use crate::error::{CellError, Result};

const DEFAULT_CAPACITY_BITS: usize = 1023;

/// Append-only bit accumulator. Mirrors `bitstream_io::BitWriter` for the
/// sequential write path and tracks a capacity so callers get a clean
/// [`CellError::BitOverflow`] instead of writing past a cell's 1023-bit
/// budget.
pub struct BitBuilder {
    writer: BitWriter<Vec<u8>, BigEndian>,
    bit_len: usize,
    capacity: usize,
}

impl Default for BitBuilder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BITS)
    }
}

impl BitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity_bits: usize) -> Self {
        BitBuilder {
            writer: BitWriter::new(Vec::new()),
            bit_len: 0,
            capacity: capacity_bits,
        }
    }

    pub fn len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.bit_len
    }

    fn ensure_capacity(&self, bits: usize) -> Result<()> {
        if self.bit_len + bits > self.capacity {
            return Err(CellError::BitOverflow {
                attempted: bits,
                available: self.remaining_capacity(),
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) -> Result<()> {
        self.writer.write_bit(bit)?;
        self.bit_len += 1;
        Ok(())
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_capacity(1)?;
        self.push_bit(bit)?;
        Ok(self)
    }

    /// Writes an unsigned integer in exactly `bits` bits, zero-extended.
    /// `bits == 0` is only valid for a zero value (no bits written).
    pub fn write_uint(&mut self, value: &BigUint, bits: usize) -> Result<&mut Self> {
        if bits == 0 {
            return if value.is_zero() {
                Ok(self)
            } else {
                Err(CellError::range(value, bits, "unsigned"))
            };
        }
        if value.bits() as usize > bits {
            return Err(CellError::range(value, bits, "unsigned"));
        }
        self.ensure_capacity(bits)?;

        let total_bytes = bits.div_ceil(8);
        let raw = value.to_bytes_be();
        let mut buf = vec![0u8; total_bytes];
        buf[total_bytes - raw.len()..].copy_from_slice(&raw);
        let skip = total_bytes * 8 - bits;
        for i in 0..bits {
            let pos = skip + i;
            let bit = (buf[pos / 8] >> (7 - pos % 8)) & 1 == 1;
            self.push_bit(bit)?;
        }
        Ok(self)
    }

    pub fn write_u64(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        self.write_uint(&BigUint::from(value), bits)
    }

    /// Writes a two's-complement signed integer in exactly `bits` bits.
    /// `bits == 0` only accepts a zero value. `bits == 1` only accepts -1
    /// or 0, which falls out of the general range check below.
    pub fn write_int(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        if bits == 0 {
            return if value.is_zero() {
                Ok(self)
            } else {
                Err(CellError::range(value, bits, "signed"))
            };
        }
        let min = -(BigInt::from(1) << (bits - 1));
        let max = (BigInt::from(1) << (bits - 1)) - BigInt::from(1);
        if value < &min || value > &max {
            return Err(CellError::range(value, bits, "signed"));
        }
        let modulus = BigInt::from(1) << bits;
        let unsigned = if value.sign() == Sign::Minus {
            (value + &modulus).to_biguint().expect("non-negative after mod")
        } else {
            value.to_biguint().expect("non-negative")
        };
        self.write_uint(&unsigned, bits)
    }

    pub fn write_i64(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        self.write_int(&BigInt::from(value), bits)
    }

    /// `header_bits`-bit length prefix (in bytes) followed by the value
    /// zero-extended to that many bytes. Used for VarUinteger and Coins.
    pub fn write_var_uint(&mut self, value: &BigUint, header_bits: usize) -> Result<&mut Self> {
        let byte_len = value.bits().div_ceil(8) as usize;
        self.write_u64(byte_len as u64, header_bits)?;
        self.write_uint(value, byte_len * 8)
    }

    /// Like [`BitBuilder::write_var_uint`] but for signed values: the byte
    /// length accounts for the sign bit (`⌈(bits(|value|)+1)/8⌉`).
    pub fn write_var_int(&mut self, value: &BigInt, header_bits: usize) -> Result<&mut Self> {
        let magnitude_bits = value.magnitude().bits() as usize;
        let byte_len = if value.is_zero() {
            0
        } else {
            (magnitude_bits + 1).div_ceil(8)
        };
        self.write_u64(byte_len as u64, header_bits)?;
        self.write_int(value, byte_len * 8)
    }

    pub fn write_coins(&mut self, amount: &BigUint) -> Result<&mut Self> {
        self.write_var_uint(amount, 4)
    }

    pub fn write_bits(&mut self, src: &BitString) -> Result<&mut Self> {
        self.ensure_capacity(src.len())?;
        for i in 0..src.len() {
            self.push_bit(src.at(i)?)?;
        }
        Ok(self)
    }

    /// Appends raw bytes. Uses a byte-aligned fast path when the current
    /// length is already a multiple of 8.
    pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.ensure_capacity(bytes.len() * 8)?;
        if self.bit_len % 8 == 0 {
            self.writer.write_bytes(bytes)?;
            self.bit_len += bytes.len() * 8;
        } else {
            for &byte in bytes {
                for shift in (0..8).rev() {
                    self.push_bit((byte >> shift) & 1 == 1)?;
                }
            }
        }
        Ok(self)
    }

    pub fn write_address(&mut self, address: &Address) -> Result<&mut Self> {
        match address {
            Address::None => {
                self.write_u64(0b00, 2)?;
            }
            Address::Internal(InternalAddress { workchain, hash }) => {
                self.write_u64(0b10, 2)?;
                self.write_bit(false)?; // anycast: none
                self.write_int(&BigInt::from(*workchain), 8)?;
                self.write_buffer(hash)?;
            }
            Address::External(bits) => {
                self.write_u64(0b01, 2)?;
                self.write_u64(bits.len() as u64, 9)?;
                self.write_bits(bits)?;
            }
        }
        Ok(self)
    }

    /// Finalizes the builder into an immutable [`BitString`]. Pads the final
    /// partial byte with zero bits (no completion tag embedded — that is a
    /// presentation concern of [`BitString::to_hex`], not a storage one).
    pub fn build(self) -> Result<BitString> {
        let bit_len = self.bit_len;
        let mut writer = self.writer;
        writer.byte_align()?;
        let bytes = writer
            .writer()
            .ok_or_else(|| CellError::internal("bit writer lost its backing buffer"))?
            .clone();
        BitString::from_bytes(bytes, bit_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_unsigned_and_signed_round_values() {
        let mut b = BitBuilder::new();
        b.write_uint(&BigUint::from(5u32), 4).unwrap();
        b.write_int(&BigInt::from(-1), 1).unwrap();
        let bs = b.build().unwrap();
        assert_eq!(bs.len(), 5);
        assert_eq!(bs.at(0).unwrap(), false);
        assert_eq!(bs.at(3).unwrap(), true);
        assert_eq!(bs.at(4).unwrap(), true);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut b = BitBuilder::new();
        assert!(b.write_uint(&BigUint::from(16u32), 4).is_err());
        assert!(b.write_int(&BigInt::from(-2), 1).is_err());
    }

    #[test]
    fn tracks_capacity() {
        let mut b = BitBuilder::with_capacity(4);
        assert!(b.write_uint(&BigUint::from(1u32), 5).is_err());
        b.write_uint(&BigUint::from(0u32), 4).unwrap();
        assert_eq!(b.remaining_capacity(), 0);
    }

    #[test]
    fn coins_round_trip_header() {
        let mut b = BitBuilder::new();
        b.write_coins(&BigUint::from(1_000_000_000u64)).unwrap();
        let bs = b.build().unwrap();
        // 4-bit header (byte length) + payload
        assert!(bs.len() >= 4);
    }
}
