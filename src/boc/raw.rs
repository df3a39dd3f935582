use std::io::Cursor;

use bitstream_io::{BigEndian, BitWrite, BitWriter, ByteRead, ByteReader};
use crc::Crc;

use crate::cell::{bits_descriptor, HASH_BYTES};
use crate::error::{CellError, Result};

fn crc32_iscsi() -> Crc<u32> {
    Crc::<u32>::new(&crc::CRC_32_ISCSI)
}

/// Wire-level cell: references are indices into the bag's cell table rather
/// than owned child cells, exactly as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawCell {
    pub(crate) data: Vec<u8>,
    pub(crate) bit_len: usize,
    pub(crate) references: Vec<usize>,
    pub(crate) level_mask: u32,
    pub(crate) is_exotic: bool,
}

impl RawCell {
    pub(crate) fn new(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<usize>,
        level_mask: u32,
        is_exotic: bool,
    ) -> Self {
        RawCell {
            data,
            bit_len,
            references,
            level_mask: level_mask & 7,
            is_exotic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawBagOfCells {
    pub(crate) cells: Vec<RawCell>,
    pub(crate) roots: Vec<usize>,
}

const GENERIC_BOC_MAGIC: u32 = 0xb5ee9c72;
const INDEXED_BOC_MAGIC: u32 = 0x68ff65f3;
const INDEXED_CRC32_BOC_MAGIC: u32 = 0xacc3a728;

impl RawBagOfCells {
    pub(crate) fn parse(serial: &[u8]) -> Result<RawBagOfCells> {
        let cursor = Cursor::new(serial);
        let mut reader: ByteReader<Cursor<&[u8]>, BigEndian> = ByteReader::endian(cursor, BigEndian);
        let magic = reader.read::<u32>()?;

        let (has_idx, has_crc32c, size) = match magic {
            GENERIC_BOC_MAGIC => {
                let header = reader.read::<u8>()?;
                let has_idx = header & 0b1000_0000 != 0;
                let has_crc32c = header & 0b0100_0000 != 0;
                let size = header & 0b0000_0111;
                if size > 4 {
                    return Err(CellError::invalid_boc(format!(
                        "invalid size {size}, must be <= 4"
                    )));
                }
                (has_idx, has_crc32c, size)
            }
            INDEXED_BOC_MAGIC => {
                let header = reader.read::<u8>()?;
                let size = header & 0b0000_0111;
                log::warn!("parsing legacy indexed BoC without CRC32C trailer");
                (true, false, size)
            }
            INDEXED_CRC32_BOC_MAGIC => {
                let header = reader.read::<u8>()?;
                let size = header & 0b0000_0111;
                log::warn!("parsing legacy indexed BoC with CRC32C trailer");
                (true, true, size)
            }
            other => {
                return Err(CellError::invalid_boc(format!(
                    "unsupported cell magic number: {other:#x}"
                )))
            }
        };

        let off_bytes = reader.read::<u8>()?;
        let cells = read_var_size(&mut reader, size)?;
        let roots = read_var_size(&mut reader, size)?;
        let _absent = read_var_size(&mut reader, size)?;
        let _tot_cells_size = read_var_size(&mut reader, off_bytes)?;

        let mut root_list = Vec::with_capacity(roots);
        for _ in 0..roots {
            root_list.push(read_var_size(&mut reader, size)?);
        }

        let mut index = Vec::new();
        if has_idx {
            for _ in 0..cells {
                index.push(read_var_size(&mut reader, off_bytes)?);
            }
        }

        let mut cell_vec = Vec::with_capacity(cells);
        for i in 0..cells {
            let cell = read_cell(&mut reader, size)?;
            log::trace!("parsed cell {i} with {} bits, {} refs", cell.bit_len, cell.references.len());
            cell_vec.push(cell);
        }

        if has_crc32c {
            let crc_bytes = reader.read::<u32>()?;
            let expected = u32::from_le_bytes(crc_bytes.to_be_bytes());
            let computed = crc32_iscsi().checksum(&serial[..serial.len() - 4]);
            if expected != computed {
                return Err(CellError::InvalidCrc { expected, computed });
            }
        }

        Ok(RawBagOfCells {
            cells: cell_vec,
            roots: root_list,
        })
    }

    pub(crate) fn serialize(&self, has_idx: bool, has_crc32: bool) -> Result<Vec<u8>> {
        let root_count = self.roots.len();
        let num_ref_bits = 32u32.saturating_sub((self.cells.len() as u32).leading_zeros()).max(1);
        let num_ref_bytes = num_ref_bits.div_ceil(8);

        let cell_sizes: Vec<u32> = self.cells.iter().map(|c| raw_cell_size(c, num_ref_bytes)).collect();
        let full_size: u32 = cell_sizes.iter().sum();

        let num_offset_bits = 32u32.saturating_sub(full_size.leading_zeros()).max(1);
        let num_offset_bytes = num_offset_bits.div_ceil(8);

        let total_size = 4
            + 1
            + 1
            + 3 * num_ref_bytes
            + num_offset_bytes
            + num_ref_bytes * root_count as u32
            + if has_idx { num_offset_bytes * self.cells.len() as u32 } else { 0 }
            + full_size
            + if has_crc32 { 4 } else { 0 };

        let mut writer = BitWriter::endian(Vec::with_capacity(total_size as usize), BigEndian);
        writer.write_var(32, GENERIC_BOC_MAGIC)?;

        let has_cache_bits = false;
        let flags: u8 = 0;
        writer.write_bit(has_idx)?;
        writer.write_bit(has_crc32)?;
        writer.write_bit(has_cache_bits)?;
        writer.write_var(2, flags)?;
        writer.write_var(3, num_ref_bytes)?;
        writer.write_var(8, num_offset_bytes)?;
        writer.write_var(8 * num_ref_bytes, self.cells.len() as u32)?;
        writer.write_var(8 * num_ref_bytes, root_count as u32)?;
        writer.write_var(8 * num_ref_bytes, 0)?; // absent cells: complete BoCs only
        writer.write_var(8 * num_offset_bytes, full_size)?;
        for &root in &self.roots {
            writer.write_var(8 * num_ref_bytes, root as u32)?;
        }
        if has_idx {
            let mut running = 0u32;
            for &size in &cell_sizes {
                running += size;
                writer.write_var(8 * num_offset_bytes, running)?;
            }
        }
        for cell in &self.cells {
            write_raw_cell(&mut writer, cell, num_ref_bytes)?;
        }

        if has_crc32 {
            let bytes = writer
                .writer()
                .ok_or_else(|| CellError::invalid_boc("stream is not byte-aligned"))?;
            let checksum = crc32_iscsi().checksum(bytes.as_slice());
            writer.write_bytes(&checksum.to_le_bytes())?;
        }
        writer.byte_align()?;
        let result = writer
            .writer()
            .ok_or_else(|| CellError::invalid_boc("stream is not byte-aligned"))?;
        Ok(result.clone())
    }
}

fn read_cell(reader: &mut ByteReader<Cursor<&[u8]>, BigEndian>, size: u8) -> Result<RawCell> {
    let d1 = reader.read::<u8>()?;
    let d2 = reader.read::<u8>()?;

    let ref_num = d1 & 0b111;
    let is_exotic = (d1 & 0b1000) != 0;
    let has_hashes = (d1 & 0b1_0000) != 0;
    let level_mask = (d1 >> 5) as u32;
    let data_size = ((d2 >> 1) + (d2 & 1)) as usize;
    let full_bytes = (d2 & 0x01) == 0;

    if has_hashes {
        let hash_count = crate::cell::level_mask_hash_count(level_mask);
        let skip_size = hash_count * (HASH_BYTES + 2);
        reader.skip(skip_size as u32)?;
    }

    let mut data = reader.read_to_vec(data_size)?;
    let data_len = data.len();
    let padding_len = if data_len > 0 && !full_bytes {
        let num_zeros = data[data_len - 1].trailing_zeros();
        if num_zeros >= 8 {
            return Err(CellError::invalid_boc(
                "last byte must not be zero when the full-byte flag is unset",
            ));
        }
        data[data_len - 1] &= !(1 << num_zeros);
        num_zeros + 1
    } else {
        0
    };
    let bit_len = data.len() * 8 - padding_len as usize;

    let mut references = Vec::with_capacity(ref_num as usize);
    for _ in 0..ref_num {
        references.push(read_var_size(reader, size)?);
    }
    Ok(RawCell::new(data, bit_len, references, level_mask, is_exotic))
}

fn raw_cell_size(cell: &RawCell, ref_size_bytes: u32) -> u32 {
    let data_len = cell.bit_len.div_ceil(8);
    2 + data_len as u32 + cell.references.len() as u32 * ref_size_bytes
}

fn write_raw_cell(
    writer: &mut BitWriter<Vec<u8>, BigEndian>,
    cell: &RawCell,
    ref_size_bytes: u32,
) -> Result<()> {
    let is_exotic = cell.is_exotic as u32;
    let num_refs = cell.references.len() as u32;
    let d1 = num_refs + is_exotic * 8 + cell.level_mask * 32;
    let d2 = bits_descriptor(cell.bit_len);

    writer.write_var(8, d1)?;
    writer.write_var(8, d2 as u32)?;

    let rest_bits = cell.bit_len % 8;
    let data_len_bytes = cell.bit_len.div_ceil(8);
    if rest_bits == 0 {
        writer.write_bytes(&cell.data)?;
    } else {
        writer.write_bytes(&cell.data[..data_len_bytes - 1])?;
        let last = cell.data[data_len_bytes - 1] | 1 << (8 - rest_bits - 1);
        writer.write_var(8, last as u32)?;
    }

    for &r in &cell.references {
        writer.write_var(8 * ref_size_bytes, r as u32)?;
    }
    Ok(())
}

fn read_var_size(reader: &mut ByteReader<Cursor<&[u8]>, BigEndian>, n: u8) -> Result<usize> {
    let bytes = reader.read_to_vec(n.into())?;
    let mut result = 0usize;
    for byte in bytes {
        result <<= 8;
        result |= byte as usize;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_cell_round_trips_through_serialize_parse() {
        let leaf = RawCell::new(vec![0xAA], 8, vec![], 0, false);
        let boc = RawBagOfCells {
            cells: vec![leaf],
            roots: vec![0],
        };
        let bytes = boc.serialize(false, true).unwrap();
        let parsed = RawBagOfCells::parse(&bytes).unwrap();
        assert_eq!(parsed, boc);
    }

    #[test]
    fn raw_cell_round_trips_with_index() {
        let leaf = RawCell::new(vec![0xAA], 8, vec![], 0, false);
        let parent = RawCell::new(vec![0x01], 8, vec![0], 0, false);
        let boc = RawBagOfCells {
            cells: vec![parent, leaf],
            roots: vec![0],
        };
        let bytes = boc.serialize(true, false).unwrap();
        let parsed = RawBagOfCells::parse(&bytes).unwrap();
        assert_eq!(parsed, boc);
    }
}
