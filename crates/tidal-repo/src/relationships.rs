use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tidal_store::{BlockStoreExt, RecordNode, RelationshipsNode, SharedStore, StoreError};
use tidal_types::{Cid, Did};
use tracing::debug;

use crate::error::{RepoError, RepoResult};

/// The record stored for each follow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub did: Did,
    pub username: String,
}

impl Follow {
    pub fn to_record(&self) -> RepoResult<RecordNode> {
        serde_json::to_value(self)
            .map(RecordNode)
            .map_err(|e| StoreError::Serialization(e.to_string()).into())
    }

    pub fn from_record(cid: &Cid, record: RecordNode) -> RepoResult<Self> {
        serde_json::from_value(record.0).map_err(|e| {
            StoreError::Decode {
                cid: *cid,
                kind: tidal_store::BlockKind::Record,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// The follow index: followed DID → follow record CID.
#[derive(Clone)]
pub struct Relationships {
    store: SharedStore,
    cid: Cid,
    follows: BTreeMap<Did, Cid>,
}

impl Relationships {
    pub fn create(store: SharedStore) -> RepoResult<Self> {
        let cid = store.put(&RelationshipsNode::default())?;
        Ok(Self {
            store,
            cid,
            follows: BTreeMap::new(),
        })
    }

    pub fn load(store: SharedStore, cid: Cid) -> RepoResult<Self> {
        let node: RelationshipsNode = store.get(&cid)?;
        Ok(Self {
            store,
            cid,
            follows: node.follows,
        })
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    fn persist(&mut self) -> RepoResult<()> {
        self.cid = self.store.put(&RelationshipsNode {
            follows: self.follows.clone(),
        })?;
        debug!(cid = %self.cid.short_hex(), follows = self.follows.len(), "persisted relationships");
        Ok(())
    }

    /// Follow `did`, replacing any existing follow record. Returns the
    /// record CID.
    pub fn follow(&mut self, did: Did, username: impl Into<String>) -> RepoResult<Cid> {
        let follow = Follow {
            did: did.clone(),
            username: username.into(),
        };
        let cid = self.store.put(&follow.to_record()?)?;
        self.follows.insert(did, cid);
        self.persist()?;
        Ok(cid)
    }

    /// Stop following `did`. Returns the removed record CID.
    pub fn unfollow(&mut self, did: &Did) -> RepoResult<Cid> {
        let cid = self
            .follows
            .remove(did)
            .ok_or_else(|| RepoError::NotFollowing(did.clone()))?;
        self.persist()?;
        Ok(cid)
    }

    pub fn is_following(&self, did: &Did) -> bool {
        self.follows.contains_key(did)
    }

    pub fn get_follow(&self, did: &Did) -> RepoResult<Option<Follow>> {
        match self.follows.get(did) {
            Some(cid) => {
                let record: RecordNode = self.store.get(cid)?;
                Ok(Some(Follow::from_record(cid, record)?))
            }
            None => Ok(None),
        }
    }

    /// Every follow record, ordered by DID.
    pub fn list_follows(&self) -> RepoResult<Vec<Follow>> {
        self.follows
            .iter()
            .map(|(_, cid)| Follow::from_record(cid, self.store.get(cid)?))
            .collect()
    }

    /// Followed DID → follow record CID.
    pub fn follows(&self) -> &BTreeMap<Did, Cid> {
        &self.follows
    }

    /// The index CID followed by every follow record CID.
    pub fn cids(&self) -> Vec<Cid> {
        std::iter::once(self.cid)
            .chain(self.follows.values().copied())
            .collect()
    }
}

impl std::fmt::Debug for Relationships {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relationships")
            .field("cid", &self.cid)
            .field("follows", &self.follows.len())
            .finish()
    }
}
