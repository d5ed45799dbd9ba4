use std::collections::HashSet;

use tidal_types::Cid;

use crate::block::Block;
use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// Lazy pre-order traversal of the block graph below a root.
///
/// Each reachable block is yielded once, parent before children, children in
/// link order. CIDs in the initial `seen` set are neither yielded nor
/// descended into. A missing or undecodable block yields one error and ends
/// the walk.
pub struct BlockWalker<'a, S: ?Sized> {
    store: &'a S,
    stack: Vec<Cid>,
    seen: HashSet<Cid>,
    failed: bool,
}

impl<'a, S: BlockStore + ?Sized> BlockWalker<'a, S> {
    /// Start a walk at `root`, treating everything in `seen` as already visited.
    pub fn new(store: &'a S, root: Cid, seen: HashSet<Cid>) -> Self {
        Self {
            store,
            stack: vec![root],
            seen,
            failed: false,
        }
    }

    /// Number of distinct CIDs visited or skipped so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    fn visit(&mut self, cid: Cid) -> StoreResult<Block> {
        let block = self
            .store
            .get_block(&cid)?
            .ok_or(StoreError::NotFound(cid))?;
        let links = block.links(&cid)?;
        self.stack.extend(links.into_iter().rev());
        Ok(block)
    }
}

impl<S: BlockStore + ?Sized> Iterator for BlockWalker<'_, S> {
    type Item = StoreResult<(Cid, Block)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(cid) = self.stack.pop() {
            if !self.seen.insert(cid) {
                continue;
            }
            return Some(match self.visit(cid) {
                Ok(block) => Ok((cid, block)),
                Err(e) => {
                    self.failed = true;
                    self.stack.clear();
                    Err(e)
                }
            });
        }
        None
    }
}
