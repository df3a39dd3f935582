use std::cmp::Ordering;

use crate::bits::BitString;
use crate::cell::{Builder, Cell};
use crate::dict::coders::ValueWriter;
use crate::dict::label::encode_label;
use crate::error::Result;

/// Builds the binary-trie cell tree for a non-empty set of fixed-width keys.
/// Grounded in the teacher's `DictBuilder::fill_cell`, adapted to work
/// directly on label bit-strings instead of a leading-bit-tagged `BigUint`.
pub(crate) fn build_tree<V>(
    mut entries: Vec<(BitString, V)>,
    max_len: usize,
    value_writer: &ValueWriter<V>,
) -> Result<Option<Cell>> {
    if entries.is_empty() {
        return Ok(None);
    }
    entries.sort_by(|a, b| compare_bits(&a.0, &b.0));
    Ok(Some(build_node(entries, max_len, value_writer)?))
}

fn build_node<V>(
    entries: Vec<(BitString, V)>,
    max_len: usize,
    value_writer: &ValueWriter<V>,
) -> Result<Cell> {
    let mut builder = Builder::new();

    if entries.len() == 1 {
        let (label, value) = entries.into_iter().next().expect("checked len == 1");
        encode_label(&mut builder, &label, max_len)?;
        value_writer(&mut builder, &value)?;
        return builder.end_cell();
    }

    let prefix_len = common_prefix_len(&entries[0].0, &entries[entries.len() - 1].0);
    let prefix = entries[0].0.substring(0, prefix_len)?;
    encode_label(&mut builder, &prefix, max_len)?;

    let new_max_len = max_len - prefix_len - 1;
    let mut left = Vec::with_capacity(entries.len() / 2);
    let mut right = Vec::with_capacity(entries.len() / 2);
    for (key, value) in entries {
        let branch_bit = key.at(prefix_len)?;
        let suffix = key.substring(prefix_len + 1, key.len() - prefix_len - 1)?;
        if branch_bit {
            right.push((suffix, value));
        } else {
            left.push((suffix, value));
        }
    }

    let left_cell = build_node(left, new_max_len, value_writer)?;
    let right_cell = build_node(right, new_max_len, value_writer)?;
    builder.store_ref(left_cell.to_arc())?;
    builder.store_ref(right_cell.to_arc())?;
    builder.end_cell()
}

fn common_prefix_len(a: &BitString, b: &BitString) -> usize {
    let len = a.len().min(b.len());
    (0..len)
        .take_while(|&i| a.at(i).unwrap_or(false) == b.at(i).unwrap_or(false))
        .count()
}

/// Keys within one dictionary always share the same length, so bit-by-bit
/// comparison here is the same ordering as treating each key as an unsigned
/// integer.
fn compare_bits(a: &BitString, b: &BitString) -> Ordering {
    for i in 0..a.len().min(b.len()) {
        let (x, y) = (a.at(i).unwrap_or(false), b.at(i).unwrap_or(false));
        if x != y {
            return x.cmp(&y);
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitBuilder;
    use crate::dict::coders::value_writer_uint_min;
    use num_bigint::BigUint;
    use std::sync::Arc;

    fn key(bits: &[bool]) -> BitString {
        let mut b = BitBuilder::new();
        for &bit in bits {
            b.write_bit(bit).unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn empty_entries_yield_no_root() {
        let writer: ValueWriter<BigUint> = Arc::new(value_writer_uint_min);
        let tree = build_tree::<BigUint>(Vec::new(), 8, &writer).unwrap();
        assert!(tree.is_none());
    }

    #[test]
    fn single_entry_builds_a_leaf() {
        let writer: ValueWriter<BigUint> = Arc::new(value_writer_uint_min);
        let entries = vec![(key(&[false, false, false]), BigUint::from(7u32))];
        let tree = build_tree(entries, 3, &writer).unwrap();
        assert!(tree.is_some());
    }
}
