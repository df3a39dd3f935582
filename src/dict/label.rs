use crate::bits::BitString;
use crate::cell::{Builder, Slice};
use crate::error::Result;

/// Number of bits needed to store an integer in `0..=max_len` — the `~n`
/// length prefix width used by both the long and same label encodings.
fn bit_width(max_len: usize) -> usize {
    if max_len == 0 {
        0
    } else {
        (64 - (max_len as u64).leading_zeros()) as usize
    }
}

enum LabelKind {
    Short,
    Long,
    Same,
}

/// Writes a `HmLabel` (the common-prefix label every `Hashmap` edge cell
/// starts with), picking whichever of the three encodings is shortest. Ties
/// are broken the same way the teacher's dict builder does: `Long` only
/// beats `Short`'s cost, and `Same` is only compared against `Short`, not
/// against the (possibly cheaper) `Long`.
pub(crate) fn encode_label(builder: &mut Builder, label: &BitString, max_len: usize) -> Result<()> {
    let n = label.len();
    let len_bits = bit_width(max_len);
    let all_same = n == 0 || (1..n).try_fold(true, |acc, i| Ok::<bool, crate::error::CellError>(acc && label.at(i)? == label.at(0)?))?;

    let short_cost = 2 + 2 * n;
    let long_cost = 2 + len_bits + n;
    let same_cost = if all_same { 3 + len_bits } else { usize::MAX };

    let mut kind = LabelKind::Short;
    if long_cost < short_cost {
        kind = LabelKind::Long;
    }
    if same_cost < short_cost {
        kind = LabelKind::Same;
    }

    match kind {
        LabelKind::Same => {
            builder.store_bit(true)?;
            builder.store_bit(true)?;
            let bit_value = if n == 0 { false } else { label.at(0)? };
            builder.store_bit(bit_value)?;
            builder.store_u64(n as u64, len_bits)?;
        }
        LabelKind::Long => {
            builder.store_bit(true)?;
            builder.store_bit(false)?;
            builder.store_u64(n as u64, len_bits)?;
            builder.store_bits(label)?;
        }
        LabelKind::Short => {
            builder.store_bit(false)?;
            for _ in 0..n {
                builder.store_bit(true)?;
            }
            builder.store_bit(false)?;
            builder.store_bits(label)?;
        }
    }
    Ok(())
}

/// Reads a `HmLabel` written by [`encode_label`].
pub(crate) fn decode_label(slice: &mut Slice, max_len: usize) -> Result<BitString> {
    let len_bits = bit_width(max_len);
    if !slice.load_bit()? {
        let mut n = 0usize;
        while slice.load_bit()? {
            n += 1;
        }
        return slice.load_bits(n);
    }
    if !slice.load_bit()? {
        let n = slice.load_u64(len_bits)? as usize;
        return slice.load_bits(n);
    }
    let bit_value = slice.load_bit()?;
    let n = slice.load_u64(len_bits)? as usize;
    repeated_bit(bit_value, n)
}

fn repeated_bit(bit: bool, n: usize) -> Result<BitString> {
    let mut bytes = vec![0u8; n.div_ceil(8)];
    if bit {
        for (i, byte) in bytes.iter_mut().enumerate().take(n.div_ceil(8)) {
            let start = i * 8;
            let bits_in_byte = n.saturating_sub(start).min(8);
            *byte = 0xFFu8 << (8 - bits_in_byte);
        }
    }
    BitString::from_bytes(bytes, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitBuilder;
    use num_bigint::BigUint;

    fn label_of(bits: &[bool]) -> BitString {
        let mut b = BitBuilder::new();
        for &bit in bits {
            b.write_bit(bit).unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn short_label_round_trips() {
        let label = label_of(&[true, false, true]);
        let mut b = Builder::new();
        encode_label(&mut b, &label, 64).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        let decoded = decode_label(&mut s, 64).unwrap();
        assert_eq!(decoded, label);
    }

    #[test]
    fn same_label_round_trips() {
        let label = label_of(&[true, true, true, true]);
        let mut b = Builder::new();
        encode_label(&mut b, &label, 64).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        let decoded = decode_label(&mut s, 64).unwrap();
        assert_eq!(decoded, label);
    }

    #[test]
    fn empty_label_round_trips() {
        let label = BitString::empty();
        let mut b = Builder::new();
        encode_label(&mut b, &label, 0).unwrap();
        let cell = b.end_cell().unwrap();
        let mut s = Slice::new(&cell).unwrap();
        let decoded = decode_label(&mut s, 0).unwrap();
        assert_eq!(decoded.len(), 0);
    }

    #[test]
    fn bit_width_matches_expected_values() {
        assert_eq!(bit_width(0), 0);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(4), 3);
        assert_eq!(bit_width(8), 4);
        let _ = BigUint::from(0u32);
    }
}
