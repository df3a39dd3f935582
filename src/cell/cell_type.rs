use crate::cell::level_mask::LevelMask;
use crate::cell::{CellRef, DEPTH_BYTES, HASH_BYTES, MAX_LEVEL};
use crate::error::{CellError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellType {
    #[default]
    Ordinary,
    PrunedBranch,
    Library,
    MerkleProof,
    MerkleUpdate,
}

#[derive(Debug, Clone, Copy)]
struct Pruned {
    hash: [u8; HASH_BYTES],
    depth: u16,
}

impl CellType {
    /// The exotic type tag lives in the first data byte.
    pub(crate) fn determine_exotic(data: &[u8]) -> Result<Self> {
        let ty = match data.first() {
            Some(1) => CellType::PrunedBranch,
            Some(2) => CellType::Library,
            Some(3) => CellType::MerkleProof,
            Some(4) => CellType::MerkleUpdate,
            Some(other) => {
                return Err(CellError::invalid_exotic(format!(
                    "invalid first byte in exotic cell data: {other}"
                )))
            }
            None => {
                return Err(CellError::invalid_exotic(
                    "not enough data for an exotic cell",
                ))
            }
        };
        Ok(ty)
    }

    pub(crate) fn validate(
        &self,
        data: &[u8],
        bit_len: usize,
        references: &[CellRef],
    ) -> Result<()> {
        match self {
            CellType::Ordinary => Ok(()),
            CellType::PrunedBranch => self.validate_pruned_branch(data, bit_len, references),
            CellType::Library => self.validate_library(bit_len),
            CellType::MerkleProof => self.validate_merkle_proof(data, bit_len, references),
            CellType::MerkleUpdate => self.validate_merkle_update(data, bit_len, references),
        }
    }

    pub(crate) fn level_mask(
        &self,
        data: &[u8],
        bit_len: usize,
        references: &[CellRef],
    ) -> Result<LevelMask> {
        let mask = match self {
            CellType::Ordinary => references
                .iter()
                .fold(LevelMask::new(0), |acc, r| acc.apply_or(r.level_mask())),
            CellType::PrunedBranch => self.pruned_level_mask(data, bit_len)?,
            CellType::Library => LevelMask::new(0),
            CellType::MerkleProof => references[0].level_mask().shift_right(),
            CellType::MerkleUpdate => references[0]
                .level_mask()
                .apply_or(references[1].level_mask())
                .shift_right(),
        };
        Ok(mask)
    }

    pub(crate) fn child_depth(&self, child: &CellRef, level: u8) -> u16 {
        if matches!(self, CellType::MerkleProof | CellType::MerkleUpdate) {
            child.depth_at(level + 1)
        } else {
            child.depth_at(level)
        }
    }

    pub(crate) fn child_hash(&self, child: &CellRef, level: u8) -> [u8; HASH_BYTES] {
        if matches!(self, CellType::MerkleProof | CellType::MerkleUpdate) {
            child.hash_at(level + 1)
        } else {
            child.hash_at(level)
        }
    }

    /// Scatters the `hash_count(level_mask)`-sized hash/depth arrays
    /// computed over significant levels into the fixed 4-slot arrays every
    /// cell carries, substituting pruned hashes for a PrunedBranch cell
    /// whose own level is lower than the slot being resolved.
    pub(crate) fn resolve_hashes_and_depths(
        &self,
        hashes: Vec<[u8; HASH_BYTES]>,
        depths: Vec<u16>,
        data: &[u8],
        bit_len: usize,
        level_mask: LevelMask,
    ) -> Result<([[u8; HASH_BYTES]; 4], [u16; 4])> {
        let mut resolved_hashes = [[0u8; HASH_BYTES]; 4];
        let mut resolved_depths = [0u16; 4];

        for i in 0..4u8 {
            let hash_index = level_mask.apply(i).hash_index();
            let (hash, depth) = if *self == CellType::PrunedBranch {
                let own_hash_index = level_mask.hash_index();
                if hash_index != own_hash_index {
                    let pruned = self.pruned(data, bit_len, level_mask)?;
                    (pruned[hash_index].hash, pruned[hash_index].depth)
                } else {
                    (hashes[0], depths[0])
                }
            } else {
                (hashes[hash_index], depths[hash_index])
            };
            resolved_hashes[i as usize] = hash;
            resolved_depths[i as usize] = depth;
        }
        Ok((resolved_hashes, resolved_depths))
    }

    fn validate_pruned_branch(
        &self,
        data: &[u8],
        bit_len: usize,
        references: &[CellRef],
    ) -> Result<()> {
        if !references.is_empty() {
            return Err(CellError::invalid_exotic(format!(
                "pruned branch cell can't have refs, got {}",
                references.len()
            )));
        }
        if bit_len < 16 {
            return Err(CellError::invalid_exotic(
                "not enough data for a pruned branch cell",
            ));
        }
        if !self.is_config_proof(bit_len) {
            let level_mask = self.pruned_level_mask(data, bit_len)?;
            let level = level_mask.level();
            if level == 0 || level > MAX_LEVEL {
                return Err(CellError::invalid_exotic(format!(
                    "pruned branch cell level must be 1..=3, got {level}"
                )));
            }
            let expected_bits =
                (2 + level_mask.apply(level - 1).hash_count() * (HASH_BYTES + DEPTH_BYTES)) * 8;
            if bit_len != expected_bits {
                return Err(CellError::invalid_exotic(format!(
                    "pruned branch cell must have exactly {expected_bits} bits, got {bit_len}"
                )));
            }
        }
        Ok(())
    }

    fn validate_library(&self, bit_len: usize) -> Result<()> {
        const SIZE: usize = (1 + HASH_BYTES) * 8;
        if bit_len != SIZE {
            return Err(CellError::invalid_exotic(format!(
                "library cell must have exactly {SIZE} bits, got {bit_len}"
            )));
        }
        Ok(())
    }

    fn validate_merkle_proof(
        &self,
        data: &[u8],
        bit_len: usize,
        references: &[CellRef],
    ) -> Result<()> {
        const SIZE: usize = (1 + HASH_BYTES + DEPTH_BYTES) * 8;
        if bit_len != SIZE {
            return Err(CellError::invalid_exotic(format!(
                "merkle proof cell must have exactly {SIZE} bits, got {bit_len}"
            )));
        }
        if references.len() != 1 {
            return Err(CellError::invalid_exotic(format!(
                "merkle proof cell must have exactly 1 ref, got {}",
                references.len()
            )));
        }
        let proof_hash: [u8; HASH_BYTES] = data[1..1 + HASH_BYTES]
            .try_into()
            .expect("slice of correct length");
        let proof_depth = u16::from_be_bytes(
            data[1 + HASH_BYTES..1 + HASH_BYTES + DEPTH_BYTES]
                .try_into()
                .expect("slice of correct length"),
        );
        let ref_hash = references[0].hash_at(0);
        let ref_depth = references[0].depth_at(0);
        if proof_depth != ref_depth {
            return Err(CellError::invalid_exotic(format!(
                "merkle proof ref depth must be {proof_depth}, got {ref_depth}"
            )));
        }
        if proof_hash != ref_hash {
            return Err(CellError::invalid_exotic(
                "merkle proof ref hash does not match referenced cell",
            ));
        }
        Ok(())
    }

    fn validate_merkle_update(
        &self,
        data: &[u8],
        bit_len: usize,
        references: &[CellRef],
    ) -> Result<()> {
        const SIZE: usize = 8 + 2 * (HASH_BYTES + DEPTH_BYTES) * 8;
        if bit_len != SIZE {
            return Err(CellError::invalid_exotic(format!(
                "merkle update cell must have exactly {SIZE} bits, got {bit_len}"
            )));
        }
        if references.len() != 2 {
            return Err(CellError::invalid_exotic(format!(
                "merkle update cell must have exactly 2 refs, got {}",
                references.len()
            )));
        }
        for (i, (hash_range, depth_range)) in [
            (1..33, 65..67),
            (33..65, 67..69),
        ]
        .into_iter()
        .enumerate()
        {
            let proof_hash: [u8; HASH_BYTES] =
                data[hash_range].try_into().expect("slice of correct length");
            let proof_depth =
                u16::from_be_bytes(data[depth_range].try_into().expect("slice of correct length"));
            let ref_hash = references[i].hash_at(0);
            let ref_depth = references[i].depth_at(0);
            if proof_depth != ref_depth {
                return Err(CellError::invalid_exotic(format!(
                    "merkle update ref {i} depth must be {proof_depth}, got {ref_depth}"
                )));
            }
            if proof_hash != ref_hash {
                return Err(CellError::invalid_exotic(format!(
                    "merkle update ref {i} hash does not match referenced cell"
                )));
            }
        }
        Ok(())
    }

    fn pruned_level_mask(&self, data: &[u8], bit_len: usize) -> Result<LevelMask> {
        if data.len() < 5 {
            return Err(CellError::invalid_exotic(format!(
                "pruned branch cell data can't be shorter than 5 bytes, got {}",
                data.len()
            )));
        }
        Ok(if self.is_config_proof(bit_len) {
            LevelMask::new(1)
        } else {
            LevelMask::new(data[1] as u32)
        })
    }

    fn pruned(&self, data: &[u8], bit_len: usize, level_mask: LevelMask) -> Result<Vec<Pruned>> {
        let start = if self.is_config_proof(bit_len) { 1 } else { 2 };
        let level = level_mask.level() as usize;
        let mut hashes = Vec::with_capacity(level);
        let mut offset = start;
        for _ in 0..level {
            let hash: [u8; HASH_BYTES] = data[offset..offset + HASH_BYTES]
                .try_into()
                .map_err(|_| CellError::invalid_exotic("truncated pruned branch hash"))?;
            hashes.push(hash);
            offset += HASH_BYTES;
        }
        let mut depths = Vec::with_capacity(level);
        for _ in 0..level {
            let depth = u16::from_be_bytes(
                data[offset..offset + DEPTH_BYTES]
                    .try_into()
                    .map_err(|_| CellError::invalid_exotic("truncated pruned branch depth"))?,
            );
            depths.push(depth);
            offset += DEPTH_BYTES;
        }
        Ok(hashes
            .into_iter()
            .zip(depths)
            .map(|(hash, depth)| Pruned { hash, depth })
            .collect())
    }

    /// Some config proofs in the wild omit the level-mask byte entirely;
    /// those are exactly 280 bits and are treated as level-1.
    fn is_config_proof(&self, bit_len: usize) -> bool {
        *self == CellType::PrunedBranch && bit_len == 280
    }
}
