use tidal_store::{BlockStoreExt, NamespaceNode, SharedStore};
use tidal_types::{Cid, Collection};
use tracing::debug;

use crate::branch::Branch;
use crate::error::RepoResult;

/// A namespace: one [`Branch`] per collection.
#[derive(Clone)]
pub struct Namespace {
    store: SharedStore,
    cid: Cid,
    posts: Branch,
    interactions: Branch,
}

impl Namespace {
    /// Persist a namespace with two empty branches.
    pub fn create(store: SharedStore) -> RepoResult<Self> {
        let posts = Branch::create(store.clone())?;
        let interactions = Branch::create(store.clone())?;
        let cid = store.put(&NamespaceNode {
            posts: posts.cid(),
            interactions: interactions.cid(),
        })?;
        Ok(Self {
            store,
            cid,
            posts,
            interactions,
        })
    }

    pub fn load(store: SharedStore, cid: Cid) -> RepoResult<Self> {
        let node: NamespaceNode = store.get(&cid)?;
        Ok(Self {
            posts: Branch::load(store.clone(), node.posts)?,
            interactions: Branch::load(store.clone(), node.interactions)?,
            store,
            cid,
        })
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    pub fn node(&self) -> NamespaceNode {
        NamespaceNode {
            posts: self.posts.cid(),
            interactions: self.interactions.cid(),
        }
    }

    pub fn collection(&self, collection: Collection) -> &Branch {
        match collection {
            Collection::Posts => &self.posts,
            Collection::Interactions => &self.interactions,
        }
    }

    /// Mutable access to a branch. Call [`Namespace::update_root`] after
    /// mutating it.
    pub fn collection_mut(&mut self, collection: Collection) -> &mut Branch {
        match collection {
            Collection::Posts => &mut self.posts,
            Collection::Interactions => &mut self.interactions,
        }
    }

    /// Re-persist the namespace node after a branch changed.
    pub fn update_root(&mut self) -> RepoResult<()> {
        self.cid = self.store.put(&self.node())?;
        debug!(cid = %self.cid.short_hex(), "persisted namespace");
        Ok(())
    }

    /// Namespace, table and record CIDs.
    pub fn cids(&self) -> RepoResult<Vec<Cid>> {
        let mut all = vec![self.cid, self.posts.cid(), self.interactions.cid()];
        all.extend(self.posts.cids()?);
        all.extend(self.interactions.cids()?);
        Ok(all)
    }

    pub fn missing_cids(&self) -> RepoResult<Vec<Cid>> {
        let mut missing = self.posts.missing_cids()?;
        missing.extend(self.interactions.missing_cids()?);
        Ok(missing)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("cid", &self.cid)
            .field("posts", &self.posts)
            .field("interactions", &self.interactions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidal_store::InMemoryBlockStore;
    use tidal_types::Tid;

    use super::*;

    fn store() -> SharedStore {
        Arc::new(InMemoryBlockStore::new())
    }

    #[test]
    fn create_and_load() {
        let s = store();
        let ns = Namespace::create(s.clone()).unwrap();
        let loaded = Namespace::load(s, ns.cid()).unwrap();
        assert_eq!(loaded.node(), ns.node());
        assert_eq!(loaded.collection(Collection::Posts).table_count(), 0);
    }

    #[test]
    fn empty_collections_share_a_cid() {
        let ns = Namespace::create(store()).unwrap();
        assert_eq!(ns.node().posts, ns.node().interactions);
    }

    #[test]
    fn collection_write_changes_namespace_cid() {
        let s = store();
        let mut ns = Namespace::create(s.clone()).unwrap();
        let before = ns.cid();
        ns.collection_mut(Collection::Interactions)
            .add_entry(Tid::new(1, 0), Cid::from_bytes(b"like"))
            .unwrap();
        ns.update_root().unwrap();
        assert_ne!(ns.cid(), before);

        let loaded = Namespace::load(s, ns.cid()).unwrap();
        assert_eq!(
            loaded
                .collection(Collection::Interactions)
                .get_entry(&Tid::new(1, 0))
                .unwrap(),
            Some(Cid::from_bytes(b"like"))
        );
        assert_eq!(loaded.collection(Collection::Posts).table_count(), 0);
    }

    #[test]
    fn debug_shows_cid_and_branches() {
        let ns = Namespace::create(store()).unwrap();
        let shown = format!("{ns:?}");
        assert!(shown.starts_with("Namespace"));
        assert!(shown.contains("posts: Branch"));
        assert!(shown.contains("interactions: Branch"));
        assert!(!shown.contains("store"));
    }

    #[test]
    fn cids_include_every_layer() {
        let mut ns = Namespace::create(store()).unwrap();
        ns.collection_mut(Collection::Posts)
            .add_entry(Tid::new(1, 0), Cid::from_bytes(b"post"))
            .unwrap();
        ns.update_root().unwrap();
        let cids = ns.cids().unwrap();
        assert!(cids.contains(&ns.cid()));
        assert!(cids.contains(&Cid::from_bytes(b"post")));
        assert_eq!(ns.missing_cids().unwrap(), vec![Cid::from_bytes(b"post")]);
    }
}
