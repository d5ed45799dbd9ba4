use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tidal_store::SharedStore;
use tidal_types::{Cid, Did};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transfer::export_diff;

/// Where a replica pulls repository updates from.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Latest published commit for `did`, if the source knows the repository.
    async fn head(&self, did: &Did) -> SyncResult<Option<Cid>>;

    /// Archive of everything reachable from the current head of `did` and
    /// not from `since`.
    async fn fetch_diff(&self, did: &Did, since: Option<Cid>) -> SyncResult<Vec<u8>>;
}

/// Serves repositories held in a local block store.
pub struct LocalSource {
    store: SharedStore,
    heads: RwLock<HashMap<Did, Cid>>,
    config: SyncConfig,
    shutdown: CancellationToken,
}

impl LocalSource {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            heads: RwLock::new(HashMap::new()),
            config: SyncConfig::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Announce `head` as the latest commit of `did`.
    pub fn publish(&self, did: Did, head: Cid) {
        debug!(did = %did, head = %head.short_hex(), "published head");
        self.heads
            .write()
            .expect("lock poisoned")
            .insert(did, head);
    }

    /// Abort diff computations in progress and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl RepoSource for LocalSource {
    async fn head(&self, did: &Did) -> SyncResult<Option<Cid>> {
        Ok(self.heads.read().expect("lock poisoned").get(did).copied())
    }

    async fn fetch_diff(&self, did: &Did, since: Option<Cid>) -> SyncResult<Vec<u8>> {
        let head = self
            .head(did)
            .await?
            .ok_or_else(|| SyncError::Transport(format!("unknown repository {did}")))?;
        export_diff(&self.store, head, since, &self.config, &self.shutdown)
    }
}

impl std::fmt::Debug for LocalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSource")
            .field("repos", &self.heads.read().expect("lock poisoned").len())
            .finish()
    }
}
