//! Conversion between block sets and the on-disk archive format.

use std::path::Path;

use tidal_pack::{PackFile, PackReader, PackWriter};
use tidal_store::BlockStore;
use tidal_types::Cid;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::diff::{compute_checkout, compute_diff, BlockSet};
use crate::error::SyncResult;

/// Encode a block set as an archive rooted at its head commit.
pub fn write_archive(blocks: &BlockSet) -> SyncResult<Vec<u8>> {
    let mut writer = PackWriter::new(blocks.root());
    writer.extend(blocks.iter().cloned());
    Ok(writer.finish_to_bytes()?)
}

/// Decode and verify an archive.
pub fn read_archive(bytes: &[u8]) -> SyncResult<BlockSet> {
    let reader = PackReader::from_bytes(bytes)?;
    let root = reader.root();
    Ok(BlockSet::new(root, reader.into_blocks()))
}

pub fn save_archive(blocks: &BlockSet, path: &Path) -> SyncResult<PackFile> {
    let mut writer = PackWriter::new(blocks.root());
    writer.extend(blocks.iter().cloned());
    Ok(writer.finish(path)?)
}

pub fn load_archive(path: &Path) -> SyncResult<BlockSet> {
    let reader = PackReader::open(path)?;
    let root = reader.root();
    Ok(BlockSet::new(root, reader.into_blocks()))
}

/// Archive of every block reachable from `head` but not from `since`.
pub fn export_diff<S>(
    store: &S,
    head: Cid,
    since: Option<Cid>,
    config: &SyncConfig,
    cancel: &CancellationToken,
) -> SyncResult<Vec<u8>>
where
    S: BlockStore + ?Sized,
{
    let blocks = compute_diff(store, head, since, config, cancel)?;
    write_archive(&blocks)
}

/// Archive of the complete history under `head`.
pub fn export_full<S>(store: &S, head: Cid, config: &SyncConfig) -> SyncResult<Vec<u8>>
where
    S: BlockStore + ?Sized,
{
    export_diff(store, head, None, config, &CancellationToken::new())
}

/// Archive of the state at `head` without commit history.
///
/// The result loads as a read-only [`tidal_repo::Repo`] but cannot be
/// replayed as a diff, since its head's `prev` is absent.
pub fn export_checkout<S>(store: &S, head: Cid, config: &SyncConfig) -> SyncResult<Vec<u8>>
where
    S: BlockStore + ?Sized,
{
    let blocks = compute_checkout(store, head, config, &CancellationToken::new())?;
    write_archive(&blocks)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidal_crypto::SigningKey;
    use tidal_repo::Repo;
    use tidal_store::{BlockStoreExt, InMemoryBlockStore, SharedStore};
    use tidal_types::Collection;

    use super::*;
    use crate::error::SyncError;

    fn repo(posts: usize) -> Repo {
        let store: SharedStore = Arc::new(InMemoryBlockStore::new());
        let mut repo = Repo::create(store, SigningKey::generate()).unwrap();
        for i in 0..posts {
            let tid = repo.next_tid();
            repo.add_record("blog", Collection::Posts, tid, serde_json::json!(i))
                .unwrap();
        }
        repo
    }

    #[test]
    fn archive_keeps_root_and_order() {
        let repo = repo(4);
        let blocks = compute_diff(
            repo.store(),
            repo.cid(),
            None,
            &SyncConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let decoded = read_archive(&write_archive(&blocks).unwrap()).unwrap();
        assert_eq!(decoded, blocks);
    }

    #[test]
    fn export_full_matches_diff_from_nothing() {
        let repo = repo(2);
        let bytes = export_full(repo.store(), repo.cid(), &SyncConfig::default()).unwrap();
        let blocks = read_archive(&bytes).unwrap();
        assert_eq!(blocks.root(), repo.cid());
        assert_eq!(blocks.len(), repo.store().walk(repo.cid()).count());
    }

    #[test]
    fn checkout_archive_loads_without_history() {
        let mut repo = repo(3);
        let first = repo.history().unwrap()[1];
        let tid = repo.next_tid();
        repo.add_record("blog", Collection::Posts, tid, serde_json::json!("latest"))
            .unwrap();

        let bytes = export_checkout(repo.store(), repo.cid(), &SyncConfig::default()).unwrap();
        let blocks = read_archive(&bytes).unwrap();
        assert_eq!(blocks.root(), repo.cid());
        assert!(!blocks.contains(&first));

        let target: SharedStore = Arc::new(InMemoryBlockStore::new());
        for (cid, block) in blocks.iter() {
            target.import_block(cid, block).unwrap();
        }
        let loaded = Repo::load(target, blocks.root()).unwrap();
        assert!(loaded.missing_cids().unwrap().is_empty());
        assert_eq!(
            loaded
                .namespace("blog")
                .unwrap()
                .collection(Collection::Posts)
                .get_all_entries()
                .unwrap()
                .len(),
            4
        );
        assert!(loaded.history().is_err());
    }

    #[test]
    fn checkout_is_not_a_replayable_diff() {
        let repo = repo(2);
        let blocks = read_archive(&export_checkout(repo.store(), repo.cid(), &SyncConfig::default()).unwrap())
            .unwrap();
        let replica: SharedStore = Arc::new(InMemoryBlockStore::new());
        let result = crate::replay::load_and_verify_diff(
            &replica,
            repo.did(),
            None,
            &blocks,
            &crate::verifier::SignatureVerifier,
            |_| {},
        );
        assert!(matches!(
            result,
            Err(SyncError::Store(tidal_store::StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn empty_diff_still_names_its_root() {
        let repo = repo(1);
        let bytes = export_diff(
            repo.store(),
            repo.cid(),
            Some(repo.cid()),
            &SyncConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let blocks = read_archive(&bytes).unwrap();
        assert!(blocks.is_empty());
        assert_eq!(blocks.root(), repo.cid());
    }

    #[test]
    fn corrupt_archive_is_a_pack_error() {
        let repo = repo(1);
        let mut bytes = export_full(repo.store(), repo.cid(), &SyncConfig::default()).unwrap();
        bytes[0] ^= 0xff;
        assert!(matches!(read_archive(&bytes), Err(SyncError::Pack(_))));
    }

    #[test]
    fn archive_survives_disk() {
        let repo = repo(3);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.tda");
        let blocks = read_archive(&export_full(repo.store(), repo.cid(), &SyncConfig::default()).unwrap()).unwrap();
        let file = save_archive(&blocks, &path).unwrap();
        assert_eq!(file.block_count, blocks.len());
        assert_eq!(load_archive(&path).unwrap(), blocks);
    }
}
