use std::fmt;
use std::sync::Arc;

use crate::error::{CellError, Result};

/// An immutable, shareable run of bits.
///
/// Backed by an `Arc<[u8]>` so that [`BitString::substring`] is a cheap
/// offset/length view rather than a copy — the same structural-sharing
/// relationship a [`crate::cell::Cell`] has with its children.
#[derive(Clone)]
pub struct BitString {
    buffer: Arc<[u8]>,
    offset: usize,
    length: usize,
}

impl BitString {
    pub fn empty() -> Self {
        BitString {
            buffer: Arc::from(Vec::new().into_boxed_slice()),
            offset: 0,
            length: 0,
        }
    }

    /// Wraps `bytes` as a bitstring of exactly `bit_len` bits, read from the
    /// start of the buffer (big-endian, MSB first).
    pub fn from_bytes(bytes: Vec<u8>, bit_len: usize) -> Result<Self> {
        if bit_len > bytes.len() * 8 {
            return Err(CellError::OutOfBounds {
                offset: 0,
                length: bit_len,
                len: bytes.len() * 8,
            });
        }
        Ok(BitString {
            buffer: Arc::from(bytes.into_boxed_slice()),
            offset: 0,
            length: bit_len,
        })
    }

    pub(crate) fn from_raw_parts(buffer: Arc<[u8]>, offset: usize, length: usize) -> Self {
        BitString {
            buffer,
            offset,
            length,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The bit at `index`, counting from the most significant bit.
    pub fn at(&self, index: usize) -> Result<bool> {
        if index >= self.length {
            return Err(CellError::OutOfBounds {
                offset: index,
                length: 1,
                len: self.length,
            });
        }
        let pos = self.offset + index;
        Ok((self.buffer[pos / 8] >> (7 - pos % 8)) & 1 == 1)
    }

    /// A view of `length` bits starting at `offset`, sharing the backing
    /// buffer. `length == 0` always succeeds, regardless of `offset`.
    pub fn substring(&self, offset: usize, length: usize) -> Result<BitString> {
        if length == 0 {
            return Ok(BitString::empty());
        }
        if offset + length > self.length {
            return Err(CellError::OutOfBounds {
                offset,
                length,
                len: self.length,
            });
        }
        Ok(BitString {
            buffer: self.buffer.clone(),
            offset: self.offset + offset,
            length,
        })
    }

    /// Like [`BitString::substring`], but requires the slice to be
    /// byte-aligned and returns owned bytes. `length == 0` always succeeds
    /// and yields an empty vector.
    pub fn subbuffer(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        if offset % 8 != 0 || length % 8 != 0 {
            return Err(CellError::NotAligned { offset, length });
        }
        if offset + length > self.length {
            return Err(CellError::OutOfBounds {
                offset,
                length,
                len: self.length,
            });
        }
        let start = (self.offset + offset) / 8;
        let end = start + length / 8;
        Ok(self.buffer[start..end].to_vec())
    }

    /// Copies this bitstring out as a zero-padded, byte-aligned buffer: bit 0
    /// lands at the MSB of byte 0, with the final byte's unused low bits
    /// left as zero (the "completion tag omitted" form).
    pub fn to_zero_padded_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.length.div_ceil(8)];
        for i in 0..self.length {
            if self.at(i).unwrap_or(false) {
                out[i / 8] |= 1 << (7 - i % 8);
            }
        }
        out
    }

    /// Canonical TON hex representation. Whole nibbles are emitted as plain
    /// hex; when the bit length isn't a multiple of 4, a completion tag (a
    /// single 1 bit, then zeros out to the next nibble boundary) is appended
    /// to the data and the result gets a literal trailing `_`.
    pub fn to_hex(&self) -> String {
        if self.length % 4 == 0 {
            let bytes = self.to_zero_padded_bytes();
            let mut s = hex::encode_upper(&bytes);
            if self.length % 8 == 4 {
                // odd number of nibbles: drop the padding nibble we never wrote data into
                s.truncate(s.len() - 1);
            }
            return s;
        }
        // tag bit at `length`, zero-padded out to the next nibble boundary
        let padded_len = (self.length + 1).div_ceil(4) * 4;
        let mut bytes = vec![0u8; padded_len.div_ceil(8)];
        for i in 0..self.length {
            if self.at(i).unwrap_or(false) {
                bytes[i / 8] |= 1 << (7 - i % 8);
            }
        }
        bytes[self.length / 8] |= 1 << (7 - self.length % 8);

        let mut s = hex::encode_upper(&bytes);
        if padded_len % 8 == 4 {
            s.truncate(s.len() - 1);
        }
        s.push('_');
        s
    }

    /// Parses the canonical hex form produced by [`BitString::to_hex`].
    pub fn from_hex(s: &str) -> Result<BitString> {
        if s.is_empty() {
            return Ok(BitString::empty());
        }
        if let Some(digits) = s.strip_suffix('_') {
            let mut digits = digits.to_string();
            if digits.len() % 2 == 1 {
                digits.push('0');
            }
            let bytes = hex::decode(&digits)
                .map_err(|e| CellError::invalid_exotic(format!("bad hex string: {e}")))?;
            let total_bits = bytes.len() * 8;
            let bits = BitString::from_bytes(bytes, total_bits)?;
            // completion tag is the lowest set bit, scanning from the right
            let mut idx = total_bits;
            loop {
                if idx == 0 {
                    return Err(CellError::invalid_exotic(
                        "hex completion tag bit not found",
                    ));
                }
                idx -= 1;
                if bits.at(idx)? {
                    break;
                }
            }
            return bits.substring(0, idx);
        }
        let mut digits = s.to_string();
        if digits.len() % 2 == 1 {
            digits.push('0');
        }
        let bytes = hex::decode(&digits)
            .map_err(|e| CellError::invalid_exotic(format!("bad hex string: {e}")))?;
        let bit_len = s.len() * 4;
        BitString::from_bytes(bytes, bit_len)
    }
}

impl PartialEq for BitString {
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        (0..self.length).all(|i| self.at(i) == other.at(i))
    }
}

impl Eq for BitString {}

impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitString({})", self.to_hex())
    }
}
