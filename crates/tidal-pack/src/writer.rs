use std::path::{Path, PathBuf};

use tidal_store::Block;
use tidal_types::Cid;
use tracing::debug;

use crate::entry::{PackEntry, MAGIC, VERSION};
use crate::error::{PackError, PackResult};

/// Result of writing an archive to disk.
#[derive(Clone, Debug)]
pub struct PackFile {
    pub path: PathBuf,
    pub root: Cid,
    pub block_count: usize,
    pub checksum: [u8; 32],
}

/// Builds an archive from a root CID and an ordered set of blocks.
pub struct PackWriter {
    root: Cid,
    entries: Vec<PackEntry>,
    level: i32,
}

impl PackWriter {
    /// Create a writer for a block set rooted at `root`.
    pub fn new(root: Cid) -> Self {
        Self {
            root,
            entries: Vec::new(),
            level: 3,
        }
    }

    /// Override the zstd compression level.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Queue a block under its claimed CID. Order is preserved.
    pub fn add_block(&mut self, cid: Cid, block: Block) {
        self.entries.push(PackEntry::new(cid, block));
    }

    /// Queue every `(cid, block)` pair from an iterator.
    pub fn extend<I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = (Cid, Block)>,
    {
        self.entries.extend(blocks.into_iter().map(PackEntry::from));
    }

    /// Number of blocks queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the archive to `path`.
    pub fn finish(self, path: &Path) -> PackResult<PackFile> {
        let root = self.root;
        let block_count = self.entries.len();
        let bytes = self.finish_to_bytes()?;
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&bytes[bytes.len() - 32..]);
        std::fs::write(path, &bytes)?;
        debug!(path = %path.display(), blocks = block_count, "archive written");
        Ok(PackFile {
            path: path.to_path_buf(),
            root,
            block_count,
            checksum,
        })
    }

    /// Build the archive in memory.
    pub fn finish_to_bytes(self) -> PackResult<Vec<u8>> {
        let mut out = Vec::new();

        // Header: magic + version + root + block count
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(self.root.as_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for entry in &self.entries {
            out.push(entry.block.kind.type_byte());
            out.extend_from_slice(entry.cid.as_bytes());

            let compressed = zstd::encode_all(entry.block.data.as_slice(), self.level)
                .map_err(|e| PackError::CompressionFailed(e.to_string()))?;

            encode_varint(&mut out, entry.block.data.len() as u64);
            encode_varint(&mut out, compressed.len() as u64);
            out.extend_from_slice(&compressed);
            out.extend_from_slice(&crc32fast::hash(&compressed).to_be_bytes());
        }

        // Trailer: BLAKE3 checksum of everything so far
        let checksum = *blake3::hash(&out).as_bytes();
        out.extend_from_slice(&checksum);
        Ok(out)
    }
}

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8]) -> PackResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(PackError::CorruptEntry {
        offset: 0,
        reason: "truncated varint".into(),
    })
}

#[cfg(test)]
mod tests {
    use tidal_store::BlockKind;

    use super::*;
    use crate::entry::{HEADER_LEN, TRAILER_LEN};

    #[test]
    fn varint_roundtrip() {
        for value in [0u64, 42, 127, 128, 1_000_000, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(&mut buf, value);
            assert_eq!(decode_varint(&buf).unwrap(), (value, buf.len()));
        }
    }

    #[test]
    fn decode_varint_truncated() {
        let err = decode_varint(&[0x80]).unwrap_err();
        assert!(matches!(err, PackError::CorruptEntry { .. }));
    }

    #[test]
    fn empty_archive_is_header_and_trailer() {
        let bytes = PackWriter::new(Cid::from_bytes(b"root"))
            .finish_to_bytes()
            .unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + TRAILER_LEN);
        assert_eq!(&bytes[0..4], b"TDLA");
        assert_eq!(&bytes[8..40], Cid::from_bytes(b"root").as_bytes());
    }

    #[test]
    fn writer_counts_blocks() {
        let mut writer = PackWriter::new(Cid::from_bytes(b"root"));
        assert!(writer.is_empty());
        let block = Block::new(BlockKind::Record, b"x".to_vec());
        writer.extend([(block.compute_cid(), block)]);
        assert_eq!(writer.len(), 1);
    }
}
