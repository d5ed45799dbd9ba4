use std::collections::HashSet;
use std::sync::Arc;

use tidal_types::Cid;

use crate::block::Block;
use crate::error::{StoreError, StoreResult};
use crate::node::Node;
use crate::walk::BlockWalker;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written. The same data always produces the
///   same CID.
/// - Concurrent reads are always safe.
/// - The store never interprets block contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlockStore: Send + Sync {
    /// Read a block by CID. Returns `Ok(None)` if it does not exist.
    fn get_block(&self, cid: &Cid) -> StoreResult<Option<Block>>;

    /// Write a block and return its CID. Writing an existing block is a no-op.
    fn put_block(&self, block: &Block) -> StoreResult<Cid>;

    /// Check whether a block exists.
    fn has(&self, cid: &Cid) -> StoreResult<bool>;

    /// Write a block received from elsewhere, verifying its claimed CID.
    fn import_block(&self, cid: &Cid, block: &Block) -> StoreResult<()> {
        let computed = block.compute_cid();
        if computed != *cid {
            return Err(StoreError::HashMismatch {
                cid: *cid,
                computed,
            });
        }
        self.put_block(block)?;
        Ok(())
    }

    /// Read several blocks. Missing blocks are `None` in the output.
    fn get_blocks(&self, cids: &[Cid]) -> StoreResult<Vec<Option<Block>>> {
        cids.iter().map(|cid| self.get_block(cid)).collect()
    }
}

/// Store handle shared by repositories, branches and tables.
pub type SharedStore = Arc<dyn BlockStore>;

/// Typed helpers over any [`BlockStore`].
pub trait BlockStoreExt: BlockStore {
    /// Serialize a node and write it.
    fn put<N: Node>(&self, node: &N) -> StoreResult<Cid> {
        self.put_block(&node.to_block()?)
    }

    /// Read a CID as a node of the expected shape.
    fn get<N: Node>(&self, cid: &Cid) -> StoreResult<N> {
        let block = self.require_block(cid)?;
        N::from_block(cid, &block)
    }

    /// Read a block, treating absence as an error.
    fn require_block(&self, cid: &Cid) -> StoreResult<Block> {
        self.get_block(cid)?.ok_or(StoreError::NotFound(*cid))
    }

    /// Lazily walk every block reachable from `root`.
    fn walk(&self, root: Cid) -> BlockWalker<'_, Self> {
        BlockWalker::new(self, root, HashSet::new())
    }

    /// Collect every block reachable from `root`, skipping the subgraphs
    /// rooted at any CID in `skip`.
    fn enumerate_blocks_under(
        &self,
        root: Cid,
        skip: &HashSet<Cid>,
    ) -> StoreResult<Vec<(Cid, Block)>> {
        BlockWalker::new(self, root, skip.clone()).collect()
    }
}

impl<S: BlockStore + ?Sized> BlockStoreExt for S {}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn get_block(&self, cid: &Cid) -> StoreResult<Option<Block>> {
        (**self).get_block(cid)
    }

    fn put_block(&self, block: &Block) -> StoreResult<Cid> {
        (**self).put_block(block)
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        (**self).has(cid)
    }

    fn import_block(&self, cid: &Cid, block: &Block) -> StoreResult<()> {
        (**self).import_block(cid, block)
    }
}
