use std::collections::HashMap;
use std::hash::Hash;

use crate::bits::BitString;
use crate::cell::{Builder, Cell, CellRef, Slice};
use crate::dict::builder::build_tree;
use crate::dict::coders::{KeyReader, KeyWriter, ValueReader, ValueWriter};
use crate::dict::parser::parse_tree;
use crate::error::{CellError, Result};

/// A `HashmapE`-shaped dictionary: a fixed-width key trie kept here as a
/// plain map, assembled into its label-compressed cell tree only when
/// [`Dictionary::store`]/[`Dictionary::store_direct`] is called, and read
/// back the same way by [`Dictionary::load`]/[`Dictionary::load_direct`].
pub struct Dictionary<K, V> {
    key_len_bits: usize,
    key_writer: KeyWriter<K>,
    key_reader: KeyReader<K>,
    value_writer: ValueWriter<V>,
    value_reader: ValueReader<V>,
    data: HashMap<K, V>,
}

/// Manual rather than derived: a derive would also require `KeyWriter<K>`
/// etc. (the `Arc<dyn Fn>` coders) to be `Clone`, which they already are, but
/// `derive(Clone)` adds that bound to `K`/`V` themselves too, which isn't
/// needed here — the coders clone as cheap `Arc` handles regardless of `K`.
impl<K: Eq + Hash + Clone, V: Clone> Clone for Dictionary<K, V> {
    fn clone(&self) -> Self {
        Dictionary {
            key_len_bits: self.key_len_bits,
            key_writer: self.key_writer.clone(),
            key_reader: self.key_reader.clone(),
            value_writer: self.value_writer.clone(),
            value_reader: self.value_reader.clone(),
            data: self.data.clone(),
        }
    }
}

impl<K: Eq + Hash, V> Dictionary<K, V> {
    pub fn empty(
        key_len_bits: usize,
        key_writer: KeyWriter<K>,
        key_reader: KeyReader<K>,
        value_writer: ValueWriter<V>,
        value_reader: ValueReader<V>,
    ) -> Self {
        Dictionary {
            key_len_bits,
            key_writer,
            key_reader,
            value_writer,
            value_reader,
            data: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.data.insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.data.get(key)
    }

    pub fn has(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.data.remove(key)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.data.values()
    }

    pub fn iterate(&self) -> impl Iterator<Item = (&K, &V)> {
        self.data.iter()
    }
}

impl<K: Eq + Hash, V: Clone> Dictionary<K, V> {
    fn encoded_entries(&self) -> Result<Vec<(BitString, V)>> {
        self.data
            .iter()
            .map(|(k, v)| Ok(((self.key_writer)(k)?, v.clone())))
            .collect()
    }

    fn root_cell(&self) -> Result<Option<Cell>> {
        let entries = self.encoded_entries()?;
        build_tree(entries, self.key_len_bits, &self.value_writer)
    }

    /// `HashmapE`: a presence bit, then the root reference if non-empty.
    pub fn store(&self, builder: &mut Builder) -> Result<()> {
        match self.root_cell()? {
            Some(root) => {
                builder.store_bit(true)?;
                builder.store_ref(root.to_arc())?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }
        Ok(())
    }

    /// Direct `Hashmap`: no presence bit. Fails if the dictionary is empty,
    /// since an empty direct hashmap has no valid cell representation.
    pub fn store_direct(&self, builder: &mut Builder) -> Result<()> {
        let root = self
            .root_cell()?
            .ok_or_else(|| CellError::internal("cannot store an empty dictionary directly"))?;
        builder.store_ref(root.to_arc())?;
        Ok(())
    }
}

impl<K: Eq + Hash, V> Dictionary<K, V> {
    pub fn load(
        slice: &mut Slice,
        key_len_bits: usize,
        key_writer: KeyWriter<K>,
        key_reader: KeyReader<K>,
        value_writer: ValueWriter<V>,
        value_reader: ValueReader<V>,
    ) -> Result<Self> {
        let present = slice.load_bit()?;
        let mut dict = Dictionary::empty(
            key_len_bits,
            key_writer,
            key_reader,
            value_writer,
            value_reader,
        );
        if present {
            let root = slice.load_ref()?.clone();
            dict.load_root(&root)?;
        }
        Ok(dict)
    }

    pub fn load_direct(
        slice: &mut Slice,
        key_len_bits: usize,
        key_writer: KeyWriter<K>,
        key_reader: KeyReader<K>,
        value_writer: ValueWriter<V>,
        value_reader: ValueReader<V>,
    ) -> Result<Self> {
        let root = slice.load_ref()?.clone();
        let mut dict = Dictionary::empty(
            key_len_bits,
            key_writer,
            key_reader,
            value_writer,
            value_reader,
        );
        dict.load_root(&root)?;
        Ok(dict)
    }

    fn load_root(&mut self, root: &CellRef) -> Result<()> {
        let mut entries = Vec::new();
        parse_tree(
            root,
            self.key_len_bits,
            &BitString::empty(),
            &self.value_reader,
            &mut entries,
        )?;
        for (bits, value) in entries {
            let key = (self.key_reader)(&bits)?;
            self.data.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::coders::{
        key_reader_u16, key_writer_u16, value_reader_uint, value_writer_uint_min,
    };
    use num_bigint::BigUint;
    use std::sync::Arc;

    #[test]
    fn round_trips_through_store_and_load() {
        let mut dict: Dictionary<u16, BigUint> = Dictionary::empty(
            16,
            Arc::new(key_writer_u16),
            Arc::new(key_reader_u16),
            Arc::new(value_writer_uint_min),
            Arc::new(value_reader_uint),
        );
        dict.set(1, BigUint::from(100u32));
        dict.set(42, BigUint::from(9000u32));
        dict.set(1000, BigUint::from(1u32));
        assert_eq!(dict.size(), 3);

        let mut builder = Builder::new();
        dict.store(&mut builder).unwrap();
        let cell = builder.end_cell().unwrap();

        let mut slice = Slice::new(&cell).unwrap();
        let loaded: Dictionary<u16, BigUint> = Dictionary::load(
            &mut slice,
            16,
            Arc::new(key_writer_u16),
            Arc::new(key_reader_u16),
            Arc::new(value_writer_uint_min),
            Arc::new(value_reader_uint),
        )
        .unwrap();

        assert_eq!(loaded.size(), 3);
        assert_eq!(loaded.get(&1), Some(&BigUint::from(100u32)));
        assert_eq!(loaded.get(&42), Some(&BigUint::from(9000u32)));
        assert_eq!(loaded.get(&1000), Some(&BigUint::from(1u32)));
        assert!(!loaded.has(&2));
    }

    #[test]
    fn empty_dictionary_stores_as_a_single_bit() {
        let dict: Dictionary<u16, BigUint> = Dictionary::empty(
            16,
            Arc::new(key_writer_u16),
            Arc::new(key_reader_u16),
            Arc::new(value_writer_uint_min),
            Arc::new(value_reader_uint),
        );
        let mut builder = Builder::new();
        dict.store(&mut builder).unwrap();
        let cell = builder.end_cell().unwrap();
        assert_eq!(cell.bit_len(), 1);
        assert!(cell.references().is_empty());
    }
}
