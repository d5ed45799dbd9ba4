use tidal_types::Cid;
use tracing::debug;

use crate::block::Block;
use crate::error::StoreResult;
use crate::memory::InMemoryBlockStore;
use crate::traits::{BlockStore, SharedStore};

/// Staging layer over a shared store.
///
/// Reads see staged blocks first, then the base store. Writes only touch the
/// staging area until [`OverlayStore::commit`] flushes them, so a failed
/// multi-step import can be discarded by dropping the overlay.
pub struct OverlayStore {
    base: SharedStore,
    staged: InMemoryBlockStore,
}

impl OverlayStore {
    pub fn new(base: SharedStore) -> Self {
        Self {
            base,
            staged: InMemoryBlockStore::new(),
        }
    }

    /// Number of blocks staged and not yet committed.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Whether `cid` is present in the staging area only.
    pub fn is_staged(&self, cid: &Cid) -> bool {
        matches!(self.staged.has(cid), Ok(true))
    }

    /// Flush every staged block to the base store. Returns the number flushed.
    pub fn commit(&self) -> StoreResult<usize> {
        let blocks = self.staged.drain();
        let count = blocks.len();
        for (_, block) in &blocks {
            self.base.put_block(block)?;
        }
        debug!(blocks = count, "overlay committed");
        Ok(count)
    }

    /// Drop every staged block without touching the base store.
    pub fn discard(&self) {
        let dropped = self.staged.drain().len();
        debug!(blocks = dropped, "overlay discarded");
    }
}

impl BlockStore for OverlayStore {
    fn get_block(&self, cid: &Cid) -> StoreResult<Option<Block>> {
        match self.staged.get_block(cid)? {
            Some(block) => Ok(Some(block)),
            None => self.base.get_block(cid),
        }
    }

    fn put_block(&self, block: &Block) -> StoreResult<Cid> {
        self.staged.put_block(block)
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.staged.has(cid)? || self.base.has(cid)?)
    }
}

impl std::fmt::Debug for OverlayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStore")
            .field("staged", &self.staged.len())
            .finish()
    }
}
