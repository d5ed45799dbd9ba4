//! Block archives for Tidal repositories.
//!
//! An archive ships an ordered block set (a full repository or the delta
//! between two commits) as a single file or buffer: zstd-compressed,
//! CRC-checked per block, with a BLAKE3 trailer over the whole archive.
//!
//! # Layout
//!
//! - **Header**: magic `TDLA`, version, root CID, block count
//! - **Block**: kind byte, CID, varint raw length, varint compressed length,
//!   compressed bytes, CRC32
//! - **Trailer**: BLAKE3 checksum of everything before it
//!
//! [`PackWriter`] builds archives; [`PackReader`] parses and verifies them.

pub mod entry;
pub mod error;
pub mod reader;
pub mod writer;

pub use entry::PackEntry;
pub use error::{PackError, PackResult};
pub use reader::PackReader;
pub use writer::{PackFile, PackWriter};

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tidal_store::{Block, BlockKind};
    use tidal_types::Cid;

    use super::*;
    use crate::entry::{HEADER_LEN, TRAILER_LEN};

    fn record(value: serde_json::Value) -> (Cid, Block) {
        let block = Block::new(BlockKind::Record, serde_json::to_vec(&value).unwrap());
        (block.compute_cid(), block)
    }

    fn sample() -> (Cid, Vec<(Cid, Block)>) {
        let blocks: Vec<_> = (0..10).map(|i| record(json!({ "n": i }))).collect();
        (blocks[0].0, blocks)
    }

    fn reseal(bytes: &mut Vec<u8>) {
        let end = bytes.len() - TRAILER_LEN;
        let checksum = *blake3::hash(&bytes[..end]).as_bytes();
        bytes[end..].copy_from_slice(&checksum);
    }

    #[test]
    fn write_read_preserves_order() {
        let (root, blocks) = sample();
        let mut writer = PackWriter::new(root);
        writer.extend(blocks.clone());
        let bytes = writer.finish_to_bytes().unwrap();

        let reader = PackReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.root(), root);
        assert_eq!(reader.block_count(), 10);
        assert!(reader.contains(&blocks[3].0));
        assert_eq!(reader.get(&blocks[3].0), Some(&blocks[3].1));
        assert_eq!(reader.into_blocks(), blocks);
    }

    #[test]
    fn empty_archive() {
        let bytes = PackWriter::new(Cid::from_bytes(b"r")).finish_to_bytes().unwrap();
        let reader = PackReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.block_count(), 0);
        assert!(reader.get(&Cid::from_bytes(b"missing")).is_none());
    }

    #[test]
    fn bad_magic() {
        let mut data = vec![0u8; 100];
        data[0..4].copy_from_slice(b"BADM");
        let err = PackReader::from_bytes(&data).unwrap_err();
        assert!(matches!(err, PackError::InvalidMagic { .. }));
    }

    #[test]
    fn bad_version() {
        let mut data = vec![0u8; 100];
        data[0..4].copy_from_slice(b"TDLA");
        data[4..8].copy_from_slice(&99u32.to_be_bytes());
        let err = PackReader::from_bytes(&data).unwrap_err();
        assert!(matches!(err, PackError::UnsupportedVersion(99)));
    }

    #[test]
    fn too_short() {
        let err = PackReader::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PackError::CorruptEntry { .. }));
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let (root, blocks) = sample();
        let mut writer = PackWriter::new(root);
        writer.extend(blocks);
        let mut bytes = writer.finish_to_bytes().unwrap();
        bytes[HEADER_LEN + 40] ^= 0x01;
        assert!(matches!(
            PackReader::from_bytes(&bytes),
            Err(PackError::ChecksumMismatch)
        ));
    }

    #[test]
    fn corrupted_payload_fails_crc() {
        let (cid, block) = record(json!({ "text": "hello" }));
        let mut writer = PackWriter::new(cid);
        writer.add_block(cid, block);
        let mut bytes = writer.finish_to_bytes().unwrap();
        // Last byte of the compressed payload sits just before the CRC.
        let at = bytes.len() - TRAILER_LEN - 4 - 1;
        bytes[at] ^= 0xff;
        reseal(&mut bytes);
        assert!(matches!(
            PackReader::from_bytes(&bytes),
            Err(PackError::CrcMismatch { cid: c }) if c == cid
        ));
    }

    #[test]
    fn wrong_claimed_cid_is_rejected() {
        let (_, block) = record(json!("payload"));
        let claimed = Cid::from_bytes(b"not the hash");
        let mut writer = PackWriter::new(claimed);
        writer.add_block(claimed, block);
        let bytes = writer.finish_to_bytes().unwrap();
        assert!(matches!(
            PackReader::from_bytes(&bytes),
            Err(PackError::CidMismatch { claimed: c, .. }) if c == claimed
        ));
    }

    #[test]
    fn truncated_block_count_is_corrupt() {
        let (root, blocks) = sample();
        let mut writer = PackWriter::new(root);
        writer.extend(blocks);
        let mut bytes = writer.finish_to_bytes().unwrap();
        bytes[40..44].copy_from_slice(&11u32.to_be_bytes());
        reseal(&mut bytes);
        assert!(matches!(
            PackReader::from_bytes(&bytes),
            Err(PackError::CorruptEntry { .. })
        ));
    }

    #[test]
    fn disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delta.tdla");
        let (root, blocks) = sample();

        let mut writer = PackWriter::new(root);
        writer.extend(blocks.clone());
        let file = writer.finish(&path).unwrap();
        assert_eq!(file.block_count, 10);
        assert!(file.path.exists());

        let reader = PackReader::open(&path).unwrap();
        assert_eq!(reader.root(), root);
        assert_eq!(reader.into_blocks(), blocks);
    }

    #[test]
    fn large_block_compresses() {
        let block = Block::new(BlockKind::Record, vec![b'a'; 100_000]);
        let cid = block.compute_cid();
        let mut writer = PackWriter::new(cid);
        writer.add_block(cid, block.clone());
        let bytes = writer.finish_to_bytes().unwrap();
        assert!(bytes.len() < 100_000);
        let reader = PackReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.get(&cid), Some(&block));
    }
}
