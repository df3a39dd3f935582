use num_bigint::{BigInt, BigUint, Sign};

use crate::address::{Address, InternalAddress};
use crate::bits::BitString;
use crate::error::{CellError, Result};

/// A cursor over a [`BitString`]. Every `load_*` has a `preload_*` twin that
/// reads without advancing, mirroring the teacher's `CellParser`.
pub struct BitReader {
    bits: BitString,
    offset: usize,
    checkpoints: Vec<usize>,
}

impl BitReader {
    pub fn new(bits: BitString) -> Self {
        BitReader {
            bits,
            offset: 0,
            checkpoints: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.bits.len() - self.offset
    }

    fn ensure_remaining(&self, bits: usize) -> Result<()> {
        if bits > self.remaining() {
            return Err(CellError::OutOfBounds {
                offset: self.offset,
                length: bits,
                len: self.bits.len(),
            });
        }
        Ok(())
    }

    /// Pushes the current position onto a checkpoint stack.
    pub fn save(&mut self) {
        self.checkpoints.push(self.offset);
    }

    /// Restores the most recently saved position. No-op if nothing was saved.
    pub fn reset(&mut self) {
        if let Some(pos) = self.checkpoints.pop() {
            self.offset = pos;
        }
    }

    pub fn skip(&mut self, bits: usize) -> Result<()> {
        self.ensure_remaining(bits)?;
        self.offset += bits;
        Ok(())
    }

    pub fn preload_bit(&self) -> Result<bool> {
        self.ensure_remaining(1)?;
        self.bits.at(self.offset)
    }

    pub fn load_bit(&mut self) -> Result<bool> {
        let v = self.preload_bit()?;
        self.offset += 1;
        Ok(v)
    }

    pub fn preload_bits(&self, bits: usize) -> Result<BitString> {
        self.ensure_remaining(bits)?;
        self.bits.substring(self.offset, bits)
    }

    pub fn load_bits(&mut self, bits: usize) -> Result<BitString> {
        let v = self.preload_bits(bits)?;
        self.offset += bits;
        Ok(v)
    }

    fn biguint_at(&self, offset: usize, bits: usize) -> Result<BigUint> {
        if bits == 0 {
            return Ok(BigUint::from(0u32));
        }
        let total_bytes = bits.div_ceil(8);
        let skip = total_bytes * 8 - bits;
        let mut buf = vec![0u8; total_bytes];
        for i in 0..bits {
            if self.bits.at(offset + i)? {
                let pos = skip + i;
                buf[pos / 8] |= 1 << (7 - pos % 8);
            }
        }
        Ok(BigUint::from_bytes_be(&buf))
    }

    pub fn preload_uint(&self, bits: usize) -> Result<BigUint> {
        self.ensure_remaining(bits)?;
        self.biguint_at(self.offset, bits)
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<BigUint> {
        let v = self.preload_uint(bits)?;
        self.offset += bits;
        Ok(v)
    }

    pub fn load_u64(&mut self, bits: usize) -> Result<u64> {
        let v = self.load_uint(bits)?;
        v.try_into()
            .map_err(|_| CellError::internal("unsigned value does not fit in u64"))
    }

    pub fn preload_int(&self, bits: usize) -> Result<BigInt> {
        if bits == 0 {
            return Ok(BigInt::from(0));
        }
        let unsigned = self.preload_uint(bits)?;
        let sign_bit = self.bits.at(self.offset)?;
        if !sign_bit {
            return Ok(BigInt::from(unsigned));
        }
        let modulus = BigInt::from(1) << bits;
        Ok(BigInt::from_biguint(Sign::Plus, unsigned) - modulus)
    }

    pub fn load_int(&mut self, bits: usize) -> Result<BigInt> {
        let v = self.preload_int(bits)?;
        self.offset += bits;
        Ok(v)
    }

    pub fn load_i64(&mut self, bits: usize) -> Result<i64> {
        let v = self.load_int(bits)?;
        v.try_into()
            .map_err(|_| CellError::internal("signed value does not fit in i64"))
    }

    pub fn load_var_uint(&mut self, header_bits: usize) -> Result<BigUint> {
        let byte_len = self.load_u64(header_bits)? as usize;
        self.load_uint(byte_len * 8)
    }

    pub fn load_var_int(&mut self, header_bits: usize) -> Result<BigInt> {
        let byte_len = self.load_u64(header_bits)? as usize;
        self.load_int(byte_len * 8)
    }

    pub fn load_coins(&mut self) -> Result<BigUint> {
        self.load_var_uint(4)
    }

    pub fn load_buffer(&mut self, bytes: usize) -> Result<Vec<u8>> {
        let bits = self.load_bits(bytes * 8)?;
        bits.subbuffer(0, bytes * 8)
    }

    pub fn load_address(&mut self) -> Result<Address> {
        let tag = self.load_u64(2)?;
        match tag {
            0b00 => Ok(Address::None),
            0b10 => {
                let anycast = self.load_bit()?;
                if anycast {
                    return Err(CellError::UnsupportedAddressTag(0b10));
                }
                let workchain = self.load_i64(8)? as i8;
                let hash_bytes = self.load_buffer(32)?;
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&hash_bytes);
                Ok(Address::Internal(InternalAddress::new(workchain, hash)))
            }
            0b01 => {
                let len = self.load_u64(9)? as usize;
                let bits = self.load_bits(len)?;
                Ok(Address::External(bits))
            }
            other => Err(CellError::UnsupportedAddressTag(other as u8)),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitBuilder;

    #[test]
    fn signed_write_read_round_trip() {
        let mut b = BitBuilder::new();
        b.write_int(&BigInt::from(-1_234_567), 22).unwrap();
        let bs = b.build().unwrap();
        let mut r = BitReader::new(bs);
        assert_eq!(r.load_int(22).unwrap(), BigInt::from(-1_234_567));
        assert!(r.is_exhausted());
    }

    #[test]
    fn save_and_reset_checkpoint() {
        let mut b = BitBuilder::new();
        b.write_u64(0xab, 8).unwrap();
        b.write_u64(0xcd, 8).unwrap();
        let bs = b.build().unwrap();
        let mut r = BitReader::new(bs);
        r.save();
        assert_eq!(r.load_u64(8).unwrap(), 0xab);
        r.reset();
        assert_eq!(r.load_u64(8).unwrap(), 0xab);
        assert_eq!(r.load_u64(8).unwrap(), 0xcd);
    }

    #[test]
    fn coins_round_trip() {
        let mut b = BitBuilder::new();
        b.write_coins(&BigUint::from(5_000_000_000u64)).unwrap();
        let bs = b.build().unwrap();
        let mut r = BitReader::new(bs);
        assert_eq!(r.load_coins().unwrap(), BigUint::from(5_000_000_000u64));
    }
}
