use std::collections::HashMap;

use tidal_store::{Block, BlockKind};
use tidal_types::Cid;

use crate::entry::{PackEntry, HEADER_LEN, MAGIC, TRAILER_LEN, VERSION};
use crate::error::{PackError, PackResult};
use crate::writer::decode_varint;

/// A fully verified archive held in memory.
///
/// Parsing checks the magic, version, trailer checksum, every CRC and every
/// block's CID, so a `PackReader` only ever exposes blocks that hash to the
/// CID they were shipped under.
#[derive(Debug)]
pub struct PackReader {
    root: Cid,
    entries: Vec<PackEntry>,
    positions: HashMap<Cid, usize>,
}

impl PackReader {
    /// Parse and verify an archive.
    pub fn from_bytes(data: &[u8]) -> PackResult<Self> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "archive too short".into(),
            });
        }
        if &data[0..4] != MAGIC {
            return Err(PackError::InvalidMagic {
                expected: String::from_utf8_lossy(MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_be_bytes(read_array(data, 4)?);
        if version != VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }

        let body_end = data.len() - TRAILER_LEN;
        if blake3::hash(&data[..body_end]).as_bytes() != &data[body_end..] {
            return Err(PackError::ChecksumMismatch);
        }

        let root = Cid::from_hash(read_array(data, 8)?);
        let count = u32::from_be_bytes(read_array(data, 40)?) as usize;

        let body = &data[..body_end];
        let mut pos = HEADER_LEN;
        let mut entries = Vec::with_capacity(count.min(body.len()));
        for _ in 0..count {
            let (entry, next) = read_entry(body, pos)?;
            entries.push(entry);
            pos = next;
        }
        if pos != body.len() {
            return Err(PackError::CorruptEntry {
                offset: pos as u64,
                reason: "trailing bytes after last block".into(),
            });
        }

        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.cid, i))
            .collect();
        Ok(Self {
            root,
            entries,
            positions,
        })
    }

    /// Read and verify an archive from disk.
    pub fn open(path: &std::path::Path) -> PackResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// The root CID recorded in the header.
    pub fn root(&self) -> Cid {
        self.root
    }

    /// Look up a block by CID.
    pub fn get(&self, cid: &Cid) -> Option<&Block> {
        self.positions.get(cid).map(|&i| &self.entries[i].block)
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.positions.contains_key(cid)
    }

    /// Number of blocks in the archive.
    pub fn block_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    /// Consume the reader, yielding `(cid, block)` pairs in archive order.
    pub fn into_blocks(self) -> Vec<(Cid, Block)> {
        self.entries.into_iter().map(PackEntry::into_parts).collect()
    }
}

fn read_array<const N: usize>(data: &[u8], at: usize) -> PackResult<[u8; N]> {
    data.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| PackError::CorruptEntry {
            offset: at as u64,
            reason: format!("expected {N} bytes"),
        })
}

fn read_entry(data: &[u8], offset: usize) -> PackResult<(PackEntry, usize)> {
    let corrupt = |reason: String| PackError::CorruptEntry {
        offset: offset as u64,
        reason,
    };

    let mut pos = offset;
    let type_byte = *data
        .get(pos)
        .ok_or_else(|| corrupt("missing type byte".into()))?;
    let kind = BlockKind::from_type_byte(type_byte)
        .ok_or_else(|| corrupt(format!("unknown type byte: {type_byte}")))?;
    pos += 1;

    let cid = Cid::from_hash(read_array(data, pos)?);
    pos += 32;

    let (raw_len, consumed) = decode_varint(&data[pos..]).map_err(|_| corrupt("bad raw length".into()))?;
    pos += consumed;
    let (compressed_len, consumed) =
        decode_varint(&data[pos..]).map_err(|_| corrupt("bad compressed length".into()))?;
    pos += consumed;

    let end = usize::try_from(compressed_len)
        .ok()
        .and_then(|len| pos.checked_add(len))
        .filter(|&end| end + 4 <= data.len())
        .ok_or_else(|| corrupt("compressed data extends beyond archive".into()))?;
    let compressed = &data[pos..end];
    let crc = u32::from_be_bytes(read_array(data, end)?);
    if crc32fast::hash(compressed) != crc {
        return Err(PackError::CrcMismatch { cid });
    }

    let raw = zstd::decode_all(compressed).map_err(|e| PackError::DecompressionFailed(e.to_string()))?;
    if raw.len() as u64 != raw_len {
        return Err(corrupt(format!(
            "size mismatch: expected {raw_len}, got {}",
            raw.len()
        )));
    }

    let block = Block::new(kind, raw);
    let computed = block.compute_cid();
    if computed != cid {
        return Err(PackError::CidMismatch {
            claimed: cid,
            computed,
        });
    }
    Ok((PackEntry::new(cid, block), end + 4))
}
