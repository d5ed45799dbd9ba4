use std::sync::Arc;

use tidal_repo::Repo;
use tidal_store::SharedStore;
use tidal_types::{Cid, Did};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::diff::BlockSet;
use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::replay::load_and_verify_diff;
use crate::transfer::read_archive;
use crate::transport::RepoSource;
use crate::verifier::CommitVerifier;

/// A local copy of one account's repository that follows a remote head.
///
/// The head only moves forward after a whole batch has verified. A rejected
/// batch leaves the replica exactly as it was.
pub struct Replica {
    store: SharedStore,
    did: Did,
    head: Option<Cid>,
    config: SyncConfig,
    verifier: Arc<dyn CommitVerifier>,
}

impl Replica {
    /// Create an empty replica of `did`.
    pub fn new(store: SharedStore, did: Did, config: SyncConfig) -> Self {
        let verifier = config.verifier();
        Self {
            store,
            did,
            head: None,
            config,
            verifier,
        }
    }

    /// Resume a replica at a head already present in `store`.
    pub fn resume(store: SharedStore, did: Did, head: Cid, config: SyncConfig) -> Self {
        Self {
            head: Some(head),
            ..Self::new(store, did, config)
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CommitVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn head(&self) -> Option<Cid> {
        self.head
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Read-only view of the repository at the current head.
    pub fn repo(&self) -> SyncResult<Option<Repo>> {
        self.head
            .map(|head| Repo::load(self.store.clone(), head))
            .transpose()
            .map_err(SyncError::from)
    }

    /// Verify and apply a block set, advancing the head on success.
    pub fn apply_blocks<F>(&mut self, blocks: &BlockSet, on_event: F) -> SyncResult<Vec<Event>>
    where
        F: FnMut(&Event),
    {
        if blocks.len() > self.config.max_blocks {
            return Err(SyncError::TooManyBlocks {
                limit: self.config.max_blocks,
            });
        }
        let events = load_and_verify_diff(
            &self.store,
            &self.did,
            self.head,
            blocks,
            self.verifier.as_ref(),
            on_event,
        )
        .inspect_err(|e| warn!(did = %self.did, error = %e, "rejected diff"))?;
        if self.head != Some(blocks.root()) {
            info!(
                did = %self.did,
                from = ?self.head.map(|c| c.short_hex()),
                to = %blocks.root().short_hex(),
                "replica advanced"
            );
            self.head = Some(blocks.root());
        }
        Ok(events)
    }

    /// Decode an archive and apply it.
    pub fn apply_archive<F>(&mut self, bytes: &[u8], on_event: F) -> SyncResult<Vec<Event>>
    where
        F: FnMut(&Event),
    {
        let blocks = read_archive(bytes)?;
        self.apply_blocks(&blocks, on_event)
    }

    /// Fetch whatever `source` has beyond the local head and apply it.
    pub async fn pull<F>(&mut self, source: &dyn RepoSource, on_event: F) -> SyncResult<Vec<Event>>
    where
        F: FnMut(&Event),
    {
        let remote = source.head(&self.did).await?;
        if remote.is_none() || remote == self.head {
            debug!(did = %self.did, "replica up to date");
            return Ok(Vec::new());
        }
        let bytes = source.fetch_diff(&self.did, self.head).await?;
        self.apply_archive(&bytes, on_event)
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("did", &self.did)
            .field("head", &self.head)
            .field("config", &self.config)
            .finish()
    }
}
