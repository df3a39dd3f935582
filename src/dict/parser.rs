use crate::bits::{BitBuilder, BitString};
use crate::cell::{Cell, Slice};
use crate::dict::coders::ValueReader;
use crate::dict::label::decode_label;
use crate::error::Result;

/// Walks the binary-trie cell tree rooted at `cell`, appending every
/// `(full key bits, value)` pair it finds. Mirrors the teacher's
/// `DictParser::parse_impl`, tracking the accumulated key as an explicit
/// bit-string rather than a leading-bit-tagged `BigUint`.
pub(crate) fn parse_tree<V>(
    cell: &Cell,
    max_len: usize,
    prefix: &BitString,
    value_reader: &ValueReader<V>,
    out: &mut Vec<(BitString, V)>,
) -> Result<()> {
    let mut slice = Slice::new(cell)?;
    let label = decode_label(&mut slice, max_len)?;
    let accumulated = concat_bits(prefix, &label)?;
    let remaining = max_len - label.len();

    if remaining == 0 {
        let value = value_reader(&mut slice)?;
        out.push((accumulated, value));
        return Ok(());
    }

    let new_max_len = remaining - 1;
    let left = slice.load_ref()?.clone();
    let right = slice.load_ref()?.clone();
    let left_prefix = concat_bit(&accumulated, false)?;
    let right_prefix = concat_bit(&accumulated, true)?;
    parse_tree(&left, new_max_len, &left_prefix, value_reader, out)?;
    parse_tree(&right, new_max_len, &right_prefix, value_reader, out)?;
    Ok(())
}

fn concat_bits(a: &BitString, b: &BitString) -> Result<BitString> {
    let mut builder = BitBuilder::with_capacity(a.len() + b.len());
    builder.write_bits(a)?;
    builder.write_bits(b)?;
    builder.build()
}

fn concat_bit(a: &BitString, bit: bool) -> Result<BitString> {
    let mut builder = BitBuilder::with_capacity(a.len() + 1);
    builder.write_bits(a)?;
    builder.write_bit(bit)?;
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::builder::build_tree;
    use crate::dict::coders::{value_reader_uint, value_writer_uint_min, ValueWriter};
    use num_bigint::BigUint;
    use std::sync::Arc;

    #[test]
    fn parses_what_was_built() {
        let writer: ValueWriter<BigUint> = Arc::new(value_writer_uint_min);
        let reader: ValueReader<BigUint> = Arc::new(value_reader_uint);

        let entries = vec![(
            {
                let mut bb = BitBuilder::with_capacity(8);
                bb.write_u64(5, 8).unwrap();
                bb.build().unwrap()
            },
            BigUint::from(42u32),
        )];
        let root = build_tree(entries, 8, &writer).unwrap().unwrap();

        let mut out = Vec::new();
        parse_tree(&root, 8, &BitString::empty(), &reader, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1, BigUint::from(42u32));
    }
}
