use std::fmt;
use std::sync::Arc;

use bitstream_io::{BigEndian, BitWrite, BitWriter};
use sha2::{Digest, Sha256};

use crate::cell::cell_type::CellType;
use crate::cell::level_mask::LevelMask;
use crate::cell::{CellRef, DEPTH_BYTES, HASH_BYTES, MAX_LEVEL};
use crate::error::{CellError, Result};

/// A Bag-of-Cells node: up to 1023 bits of payload plus up to 4 child
/// references. Hashes and depths for every significant level are computed
/// once at construction and never recomputed — a `Cell` is immutable once
/// built, the same invariant a [`crate::cell::Builder`] enforces by only
/// handing one out through [`Builder::end_cell`](crate::cell::Builder::end_cell).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<CellRef>,
    cell_type: CellType,
    level_mask: LevelMask,
    hashes: [[u8; HASH_BYTES]; 4],
    depths: [u16; 4],
}

impl Cell {
    pub fn new(data: Vec<u8>, bit_len: usize, references: Vec<CellRef>) -> Result<Self> {
        Self::new_impl(data, bit_len, references, false)
    }

    pub fn new_exotic(data: Vec<u8>, bit_len: usize, references: Vec<CellRef>) -> Result<Self> {
        Self::new_impl(data, bit_len, references, true)
    }

    fn new_impl(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<CellRef>,
        is_exotic: bool,
    ) -> Result<Self> {
        if bit_len > 1023 {
            return Err(CellError::BitOverflow {
                attempted: bit_len,
                available: 1023,
            });
        }
        if references.len() > 4 {
            return Err(CellError::RefOverflow {
                index: references.len(),
            });
        }
        let cell_type = if is_exotic {
            CellType::determine_exotic(&data)?
        } else {
            CellType::Ordinary
        };
        cell_type.validate(&data, bit_len, &references)?;
        let level_mask = cell_type.level_mask(&data, bit_len, &references)?;
        let (hashes, depths) =
            calculate_hashes_and_depths(cell_type, &data, bit_len, &references, level_mask)?;

        Ok(Cell {
            data,
            bit_len,
            references,
            cell_type,
            level_mask,
            hashes,
            depths,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn references(&self) -> &[CellRef] {
        &self.references
    }

    pub fn reference(&self, index: usize) -> Result<&CellRef> {
        self.references.get(index).ok_or(CellError::OutOfBounds {
            offset: index,
            length: 1,
            len: self.references.len(),
        })
    }

    pub fn is_exotic(&self) -> bool {
        self.cell_type != CellType::Ordinary
    }

    pub(crate) fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub(crate) fn level_mask(&self) -> LevelMask {
        self.level_mask
    }

    pub fn depth(&self) -> u16 {
        self.depth_at(MAX_LEVEL)
    }

    pub fn depth_at(&self, level: u8) -> u16 {
        self.depths[level.min(3) as usize]
    }

    pub fn hash(&self) -> [u8; HASH_BYTES] {
        self.hash_at(MAX_LEVEL)
    }

    pub fn hash_at(&self, level: u8) -> [u8; HASH_BYTES] {
        self.hashes[level.min(3) as usize]
    }

    pub fn to_arc(self) -> CellRef {
        Arc::new(self)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::new(Vec::new(), 0, Vec::new()).expect("empty cell is always valid")
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.cell_type {
            CellType::Ordinary | CellType::Library => 'x',
            CellType::PrunedBranch | CellType::MerkleProof => 'p',
            CellType::MerkleUpdate => 'u',
        };
        let completion_tag = if self.bit_len % 8 != 0 { "_" } else { "" };
        writeln!(
            f,
            "Cell {tag}{{ data: [{}{completion_tag}]",
            self.data.iter().map(|b| format!("{b:02X}")).collect::<String>()
        )?;
        writeln!(f, "  bit_len: {}", self.bit_len)?;
        for reference in &self.references {
            writeln!(f, "  {}", format!("{reference:?}").replace('\n', "\n  "))?;
        }
        write!(
            f,
            "  cell_type: {:?}, level_mask: {:?}, depth: {} }}",
            self.cell_type,
            self.level_mask,
            self.depth()
        )
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `d2`: bit-length descriptor. The same formula is used both when hashing
/// a cell's own representation and when the BoC serializer writes a cell
/// row, per the Open Question resolution that both call sites must agree.
pub(crate) fn bits_descriptor(bit_len: usize) -> u8 {
    let full_bytes = bit_len % 8 == 0;
    let data_len = bit_len.div_ceil(8);
    data_len as u8 * 2 - (!full_bytes) as u8
}

fn refs_descriptor(cell_type: CellType, references: &[CellRef], level_mask: u32) -> u8 {
    let is_exotic = (cell_type != CellType::Ordinary) as u8;
    references.len() as u8 + 8 * is_exotic + 32 * level_mask as u8
}

fn write_data(writer: &mut BitWriter<Vec<u8>, BigEndian>, data: &[u8], bit_len: usize) -> Result<()> {
    let rest_bits = bit_len % 8;
    if rest_bits == 0 {
        writer.write_bytes(data)?;
    } else {
        writer.write_bytes(&data[..data.len() - 1])?;
        let last = data[data.len() - 1];
        let tagged = last | 1 << (8 - rest_bits - 1);
        writer.write(8, tagged)?;
    }
    Ok(())
}

fn write_ref_depths(
    writer: &mut BitWriter<Vec<u8>, BigEndian>,
    refs: &[CellRef],
    parent_type: CellType,
    level: u8,
) -> Result<()> {
    for r in refs {
        let depth = parent_type.child_depth(r, level);
        writer.write(8, depth / 256)?;
        writer.write(8, depth % 256)?;
    }
    Ok(())
}

fn write_ref_hashes(
    writer: &mut BitWriter<Vec<u8>, BigEndian>,
    refs: &[CellRef],
    parent_type: CellType,
    level: u8,
) -> Result<()> {
    for r in refs {
        let hash = parent_type.child_hash(r, level);
        writer.write_bytes(&hash)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn repr_for_level(
    (original_data, original_bit_len): (&[u8], usize),
    (data, bit_len): (&[u8], usize),
    refs: &[CellRef],
    level_mask: LevelMask,
    level: u8,
    cell_type: CellType,
) -> Result<Vec<u8>> {
    let buffer_len = 2 + data.len() + (HASH_BYTES + DEPTH_BYTES) * refs.len();
    let mut writer = BitWriter::endian(Vec::with_capacity(buffer_len), BigEndian);
    let d1 = refs_descriptor(cell_type, refs, level_mask.apply(level).mask());
    let d2 = bits_descriptor(original_bit_len);
    writer.write(8, d1)?;
    writer.write(8, d2)?;
    write_data(&mut writer, data, bit_len)?;
    write_ref_depths(&mut writer, refs, cell_type, level)?;
    write_ref_hashes(&mut writer, refs, cell_type, level)?;
    writer
        .writer()
        .ok_or_else(|| CellError::internal("cell representation stream is not byte-aligned"))
        .map(|b| b.clone())
}

fn calculate_hashes_and_depths(
    cell_type: CellType,
    data: &[u8],
    bit_len: usize,
    references: &[CellRef],
    level_mask: LevelMask,
) -> Result<([[u8; HASH_BYTES]; 4], [u16; 4])> {
    let hash_count = if cell_type == CellType::PrunedBranch {
        1
    } else {
        level_mask.hash_count()
    };
    let total_hash_count = level_mask.hash_count();
    let hash_i_offset = total_hash_count - hash_count;

    let mut depths: Vec<u16> = Vec::with_capacity(hash_count);
    let mut hashes: Vec<[u8; HASH_BYTES]> = Vec::with_capacity(hash_count);

    for (hash_i, level_i) in (0..=level_mask.level())
        .filter(|&l| level_mask.is_significant(l))
        .enumerate()
    {
        if hash_i < hash_i_offset {
            continue;
        }
        let (current_data, current_bit_len) = if hash_i == hash_i_offset {
            (data, bit_len)
        } else {
            let prev = hashes
                .get(hash_i - hash_i_offset - 1)
                .ok_or_else(|| CellError::internal("missing previous level hash"))?;
            (prev.as_slice(), HASH_BYTES * 8)
        };

        let depth = if references.is_empty() {
            0
        } else {
            references
                .iter()
                .map(|r| cell_type.child_depth(r, level_i))
                .max()
                .unwrap_or(0)
                + 1
        };

        let repr = repr_for_level(
            (data, bit_len),
            (current_data, current_bit_len),
            references,
            level_mask,
            level_i,
            cell_type,
        )?;
        let hash: [u8; HASH_BYTES] = Sha256::digest(&repr)
            .as_slice()
            .try_into()
            .map_err(|_| CellError::internal("sha256 digest is not 32 bytes"))?;

        depths.push(depth);
        hashes.push(hash);
    }

    cell_type.resolve_hashes_and_depths(hashes, depths, data, bit_len, level_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cell_hash_is_stable() {
        let a = Cell::default();
        let b = Cell::new(Vec::new(), 0, Vec::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn single_byte_cell_hashes_deterministically() {
        let c1 = Cell::new(vec![0xAA], 8, Vec::new()).unwrap();
        let c2 = Cell::new(vec![0xAA], 8, Vec::new()).unwrap();
        assert_eq!(c1.hash(), c2.hash());
        assert_eq!(c1.depth(), 0);
    }

    #[test]
    fn parent_depth_is_one_plus_child() {
        let leaf = Cell::new(vec![0x01], 8, Vec::new()).unwrap().to_arc();
        let parent = Cell::new(vec![0x02], 8, vec![leaf]).unwrap();
        assert_eq!(parent.depth(), 1);
    }

    #[test]
    fn rejects_bit_len_overflow() {
        assert!(Cell::new(vec![0; 200], 1024, Vec::new()).is_err());
    }

    #[test]
    fn rejects_too_many_references() {
        let child = Cell::default().to_arc();
        let refs = vec![child; 5];
        assert!(Cell::new(Vec::new(), 0, refs).is_err());
    }
}
