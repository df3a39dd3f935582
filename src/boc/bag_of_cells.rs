use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::boc::raw::{RawBagOfCells, RawCell};
use crate::cell::{cell_level_mask, Cell, CellRef};
use crate::error::{CellError, Result};

/// A set of root cells plus everything reachable from them, as serialized
/// by the BoC wire format.
#[derive(Debug, Clone)]
pub struct BagOfCells {
    roots: Vec<CellRef>,
}

impl BagOfCells {
    pub fn new(roots: Vec<CellRef>) -> Self {
        BagOfCells { roots }
    }

    pub fn from_root(root: Cell) -> Self {
        BagOfCells {
            roots: vec![root.to_arc()],
        }
    }

    pub fn add_root(&mut self, root: CellRef) {
        self.roots.push(root);
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    pub fn root(&self, index: usize) -> Result<&CellRef> {
        self.roots.get(index).ok_or(CellError::OutOfBounds {
            offset: index,
            length: 1,
            len: self.roots.len(),
        })
    }

    pub fn single_root(&self) -> Result<&CellRef> {
        if self.roots.len() != 1 {
            return Err(CellError::internal(format!(
                "expected exactly one root, got {}",
                self.roots.len()
            )));
        }
        Ok(&self.roots[0])
    }

    pub fn parse(serial: &[u8]) -> Result<BagOfCells> {
        let raw = RawBagOfCells::parse(serial)?;
        let cells = rebuild_cells(&raw.cells)?;
        let roots = raw
            .roots
            .iter()
            .map(|&i| {
                cells.get(i).cloned().ok_or_else(|| {
                    CellError::invalid_boc(format!("root index {i} out of range"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BagOfCells { roots })
    }

    pub fn parse_hex(s: &str) -> Result<BagOfCells> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CellError::invalid_boc(format!("bad hex BoC: {e}")))?;
        BagOfCells::parse(&bytes)
    }

    pub fn parse_base64(s: &str) -> Result<BagOfCells> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| CellError::invalid_boc(format!("bad base64 BoC: {e}")))?;
        BagOfCells::parse(&bytes)
    }

    pub fn serialize(&self, has_idx: bool, has_crc32: bool) -> Result<Vec<u8>> {
        let raw = self.to_raw()?;
        raw.serialize(has_idx, has_crc32)
    }

    pub fn serialize_to_hex(&self, has_idx: bool, has_crc32: bool) -> Result<String> {
        Ok(hex::encode_upper(self.serialize(has_idx, has_crc32)?))
    }

    pub fn serialize_to_base64(&self, has_idx: bool, has_crc32: bool) -> Result<String> {
        Ok(STANDARD.encode(self.serialize(has_idx, has_crc32)?))
    }

    fn to_raw(&self) -> Result<RawBagOfCells> {
        let index = build_and_verify_index(&self.roots);
        let mut entries: Vec<_> = index.values().collect();
        entries.sort_unstable_by_key(|c| c.borrow().index);
        entries
            .iter()
            .enumerate()
            .for_each(|(real_index, indexed)| indexed.borrow_mut().index = real_index);

        let ordered: Vec<CellRef> = entries.iter().map(|c| c.borrow().cell.clone()).collect();
        let raw_cells = ordered
            .iter()
            .map(|cell| raw_cell_from_cell(cell, &index))
            .collect::<Result<Vec<_>>>()?;
        let roots = self
            .roots
            .iter()
            .map(|root| {
                index
                    .get(&root.hash())
                    .map(|c| c.borrow().index)
                    .ok_or_else(|| CellError::internal("root cell missing from index"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RawBagOfCells {
            cells: raw_cells,
            roots,
        })
    }
}

struct IndexedCell {
    index: usize,
    cell: CellRef,
}

/// Breadth-first indexes every reachable cell by its representation hash,
/// then re-passes over the index moving any reference that points forward
/// in the table to the back — the table must list every cell before the
/// cells that reference it.
fn build_and_verify_index(roots: &[CellRef]) -> HashMap<[u8; 32], RefCell<IndexedCell>> {
    let mut current: Vec<CellRef> = roots.to_vec();
    let mut next_index = 0usize;
    let mut by_hash: HashMap<[u8; 32], RefCell<IndexedCell>> = HashMap::new();

    while !current.is_empty() {
        let mut next_cells = Vec::with_capacity(current.len() * 4);
        for cell in &current {
            let hash = cell.hash();
            if by_hash.contains_key(&hash) {
                continue;
            }
            by_hash.insert(
                hash,
                RefCell::new(IndexedCell {
                    cell: Arc::clone(cell),
                    index: next_index,
                }),
            );
            next_index += 1;
            next_cells.extend(cell.references().iter().cloned());
        }
        current = next_cells;
    }

    let mut needs_reverify = true;
    while needs_reverify {
        needs_reverify = false;
        for indexed in by_hash.values() {
            for reference in indexed.borrow().cell.references() {
                let ref_hash = reference.hash();
                if let Some(referenced) = by_hash.get(&ref_hash) {
                    if referenced.borrow().index < indexed.borrow().index {
                        referenced.borrow_mut().index = next_index;
                        next_index += 1;
                        needs_reverify = true;
                    }
                }
            }
        }
    }

    by_hash
}

fn raw_cell_from_cell(
    cell: &Cell,
    index: &HashMap<[u8; 32], RefCell<IndexedCell>>,
) -> Result<RawCell> {
    let references = cell
        .references()
        .iter()
        .map(|r| {
            index
                .get(&r.hash())
                .map(|c| c.borrow().index)
                .ok_or_else(|| CellError::internal("reference missing from cell index"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RawCell::new(
        cell.data().to_vec(),
        cell.bit_len(),
        references,
        cell_level_mask(cell),
        cell.is_exotic(),
    ))
}

fn rebuild_cells(raw_cells: &[RawCell]) -> Result<Vec<CellRef>> {
    // RawCell references always point to later entries in this list (every
    // cell is listed before anything that references it), so a single pass
    // from the end backward is enough: by the time we reach index i, every
    // index > i has already been built.
    let mut built: Vec<Option<CellRef>> = vec![None; raw_cells.len()];
    for i in (0..raw_cells.len()).rev() {
        let raw = &raw_cells[i];
        let references = raw
            .references
            .iter()
            .map(|&idx| {
                built
                    .get(idx)
                    .and_then(|c| c.clone())
                    .ok_or_else(|| CellError::invalid_boc(format!("backward reference to cell {idx}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let cell = if raw.is_exotic {
            Cell::new_exotic(raw.data.clone(), raw.bit_len, references)?
        } else {
            Cell::new(raw.data.clone(), raw.bit_len, references)?
        };
        built[i] = Some(cell.to_arc());
    }
    Ok(built.into_iter().map(|c| c.expect("every cell built")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Builder;

    #[test]
    fn shared_reference_round_trips() {
        let leaf = Builder::new()
            .store_u64(7, 8)
            .unwrap()
            .end_cell()
            .unwrap()
            .to_arc();

        let mut left = Builder::new();
        left.store_ref(leaf.clone()).unwrap();
        let left_cell = left.end_cell().unwrap().to_arc();

        let mut right = Builder::new();
        right.store_ref(leaf.clone()).unwrap();
        let right_cell = right.end_cell().unwrap().to_arc();

        let mut root = Builder::new();
        root.store_ref(left_cell).unwrap();
        root.store_ref(right_cell).unwrap();
        let root_cell = root.end_cell().unwrap();

        let boc = BagOfCells::from_root(root_cell);
        let bytes = boc.serialize(true, true).unwrap();
        let parsed = BagOfCells::parse(&bytes).unwrap();

        let parsed_root = parsed.single_root().unwrap();
        assert_eq!(parsed_root.hash(), boc.single_root().unwrap().hash());
        let a = parsed_root.reference(0).unwrap().reference(0).unwrap();
        let b = parsed_root.reference(1).unwrap().reference(0).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hex_and_base64_round_trip() {
        let cell = Builder::new().store_u64(1, 8).unwrap().end_cell().unwrap();
        let boc = BagOfCells::from_root(cell);
        let hex = boc.serialize_to_hex(false, false).unwrap();
        let from_hex = BagOfCells::parse_hex(&hex).unwrap();
        assert_eq!(
            from_hex.single_root().unwrap().hash(),
            boc.single_root().unwrap().hash()
        );

        let b64 = boc.serialize_to_base64(true, false).unwrap();
        let from_b64 = BagOfCells::parse_base64(&b64).unwrap();
        assert_eq!(
            from_b64.single_root().unwrap().hash(),
            boc.single_root().unwrap().hash()
        );
    }
}
