use std::collections::HashSet;

use tidal_store::{Block, BlockStore, BlockStoreExt, BlockWalker, CommitNode, RootNode};
use tidal_types::Cid;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Blocks introduced by a commit relative to some older commit, in walk
/// order (parents before children).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSet {
    root: Cid,
    blocks: Vec<(Cid, Block)>,
}

impl BlockSet {
    pub fn new(root: Cid, blocks: Vec<(Cid, Block)>) -> Self {
        Self { root, blocks }
    }

    /// Head commit the blocks were computed for.
    pub fn root(&self) -> Cid {
        self.root
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.blocks.iter().any(|(c, _)| c == cid)
    }

    pub fn cids(&self) -> Vec<Cid> {
        self.blocks.iter().map(|(cid, _)| *cid).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Cid, Block)> {
        self.blocks.iter()
    }

    pub fn into_blocks(self) -> Vec<(Cid, Block)> {
        self.blocks
    }
}

/// Compute the blocks reachable from `new_root` that are not reachable from
/// `old_root`.
///
/// The whole graph under `old_root` must be present in `store`. Both walks
/// check `cancel` before each block; a cancelled walk returns
/// [`SyncError::Cancelled`] and nothing else. A diff larger than
/// `config.max_blocks` fails with [`SyncError::TooManyBlocks`].
pub fn compute_diff<S>(
    store: &S,
    new_root: Cid,
    old_root: Option<Cid>,
    config: &SyncConfig,
    cancel: &CancellationToken,
) -> SyncResult<BlockSet>
where
    S: BlockStore + ?Sized,
{
    let mut known = HashSet::new();
    if let Some(old) = old_root {
        for item in store.walk(old) {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let (cid, _) = item?;
            known.insert(cid);
        }
    }
    let skipped = known.len();

    let blocks = collect(store, new_root, known, config, cancel)?;
    debug!(
        root = %new_root.short_hex(),
        known = skipped,
        new = blocks.len(),
        "computed diff"
    );
    Ok(blocks)
}

/// The blocks of the state at `head` without its commit history: the head
/// commit, its root and everything under it except the `prev` chain.
pub fn compute_checkout<S>(
    store: &S,
    head: Cid,
    config: &SyncConfig,
    cancel: &CancellationToken,
) -> SyncResult<BlockSet>
where
    S: BlockStore + ?Sized,
{
    let commit: CommitNode = store.get(&head)?;
    let root: RootNode = store.get(&commit.root)?;
    let skip: HashSet<Cid> = root.prev.into_iter().collect();

    let blocks = collect(store, head, skip, config, cancel)?;
    debug!(root = %head.short_hex(), blocks = blocks.len(), "computed checkout");
    Ok(blocks)
}

fn collect<S>(
    store: &S,
    root: Cid,
    skip: HashSet<Cid>,
    config: &SyncConfig,
    cancel: &CancellationToken,
) -> SyncResult<BlockSet>
where
    S: BlockStore + ?Sized,
{
    let mut blocks = Vec::new();
    for item in BlockWalker::new(store, root, skip) {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        blocks.push(item?);
        if blocks.len() > config.max_blocks {
            return Err(SyncError::TooManyBlocks {
                limit: config.max_blocks,
            });
        }
    }
    Ok(BlockSet::new(root, blocks))
}
