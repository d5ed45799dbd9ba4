use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tidal_crypto::{SigningKey, VerifyingKey};
use tidal_store::{BlockStore, BlockStoreExt, CommitNode, RecordNode, RootNode, SharedStore};
use tidal_types::{Cid, Collection, Did, Tid, TidClock};
use tracing::{debug, info};

use crate::auth::{AllowAll, WriteAuthority, WriteScope};
use crate::error::{RepoError, RepoResult};
use crate::namespace::Namespace;
use crate::relationships::Relationships;
use crate::write::WriteOp;

/// An account's repository: namespaces of tiered branches plus a follow
/// index, published as a chain of signed commits.
///
/// Each write re-persists what it touched and appends a new commit whose
/// `prev` is the previous head. Several writes can be staged with
/// [`Repo::stage`] and published as one commit by [`Repo::commit_staged`].
/// A repo loaded without its signing key is read-only. Writes take
/// `&mut self`, so one `Repo` value is one writer.
pub struct Repo {
    store: SharedStore,
    cid: Cid,
    root: RootNode,
    namespaces: BTreeMap<String, Namespace>,
    relationships: Relationships,
    signer: Option<SigningKey>,
    authority: Arc<dyn WriteAuthority>,
    clock: TidClock,
    staged: Vec<WriteOp>,
}

impl Repo {
    /// Create an empty repository owned by the signer's `did:key` and
    /// publish its genesis commit.
    pub fn create(store: SharedStore, signer: SigningKey) -> RepoResult<Self> {
        let did = signer.did();
        let relationships = Relationships::create(store.clone())?;
        let root = RootNode {
            did: did.clone(),
            prev: None,
            namespaces: BTreeMap::new(),
            relationships: relationships.cid(),
        };
        let cid = Self::sign_and_put(&store, &signer, &root)?;
        info!(did = %did, commit = %cid.short_hex(), "created repository");
        Ok(Self {
            store,
            cid,
            root,
            namespaces: BTreeMap::new(),
            relationships,
            signer: Some(signer),
            authority: Arc::new(AllowAll),
            clock: TidClock::new(0),
            staged: Vec::new(),
        })
    }

    /// Load a repository at a commit, read-only.
    ///
    /// The key clock resumes after the newest indexed key so a writer never
    /// hands out a key below the current tables.
    pub fn load(store: SharedStore, cid: Cid) -> RepoResult<Self> {
        let commit: CommitNode = store.get(&cid)?;
        let root: RootNode = store.get(&commit.root)?;
        let namespaces = root
            .namespaces
            .iter()
            .map(|(id, ns)| Ok((id.clone(), Namespace::load(store.clone(), *ns)?)))
            .collect::<RepoResult<BTreeMap<_, _>>>()?;
        let relationships = Relationships::load(store.clone(), root.relationships)?;
        let clock = match newest_key(&namespaces)? {
            Some(last) => TidClock::resume(0, last),
            None => TidClock::new(0),
        };
        debug!(did = %root.did, commit = %cid.short_hex(), "loaded repository");
        Ok(Self {
            store,
            cid,
            root,
            namespaces,
            relationships,
            signer: None,
            authority: Arc::new(AllowAll),
            clock,
            staged: Vec::new(),
        })
    }

    /// Load a repository at a commit for writing.
    pub fn load_with_signer(store: SharedStore, cid: Cid, signer: SigningKey) -> RepoResult<Self> {
        let mut repo = Self::load(store, cid)?;
        if signer.did() != repo.root.did {
            return Err(RepoError::KeyMismatch(repo.root.did.clone()));
        }
        repo.signer = Some(signer);
        Ok(repo)
    }

    /// Replace the capability check consulted before writes.
    pub fn with_authority(mut self, authority: Arc<dyn WriteAuthority>) -> Self {
        self.authority = authority;
        self
    }

    /// Head commit CID.
    pub fn cid(&self) -> Cid {
        self.cid
    }

    pub fn did(&self) -> &Did {
        &self.root.did
    }

    /// Root node of the head commit.
    pub fn root(&self) -> &RootNode {
        &self.root
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn is_read_only(&self) -> bool {
        self.signer.is_none()
    }

    pub fn namespace(&self, id: &str) -> Option<&Namespace> {
        self.namespaces.get(id)
    }

    pub fn namespace_ids(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// A fresh key for this writer.
    pub fn next_tid(&mut self) -> Tid {
        self.clock.next()
    }

    /// Check the head commit's signature against the repository DID.
    pub fn verify(&self) -> RepoResult<()> {
        let commit: CommitNode = self.store.get(&self.cid)?;
        let key = VerifyingKey::from_did(&self.root.did)?;
        key.verify(commit.root.as_bytes(), &commit.sig)?;
        Ok(())
    }

    /// Commit CIDs from the head back to genesis.
    pub fn history(&self) -> RepoResult<Vec<Cid>> {
        let mut out = vec![self.cid];
        let mut prev = self.root.prev;
        while let Some(cid) = prev {
            out.push(cid);
            let commit: CommitNode = self.store.get(&cid)?;
            let root: RootNode = self.store.get(&commit.root)?;
            prev = root.prev;
        }
        Ok(out)
    }

    /// Move the head back `count` commits.
    ///
    /// The next write chains from the older commit. Fails with
    /// [`RepoError::HistoryTooShort`] when the chain has fewer than `count`
    /// ancestors, leaving the repo unchanged. Staged writes are discarded.
    pub fn revert(&mut self, count: usize) -> RepoResult<()> {
        let mut target = self.cid;
        let mut prev = self.root.prev;
        for walked in 0..count {
            target = prev.ok_or(RepoError::HistoryTooShort {
                requested: count,
                available: walked,
            })?;
            let commit: CommitNode = self.store.get(&target)?;
            let root: RootNode = self.store.get(&commit.root)?;
            prev = root.prev;
        }
        let reverted = Self::load(self.store.clone(), target)?;
        info!(
            count,
            from = %self.cid.short_hex(),
            to = %target.short_hex(),
            "reverted repository"
        );
        self.cid = reverted.cid;
        self.root = reverted.root;
        self.namespaces = reverted.namespaces;
        self.relationships = reverted.relationships;
        self.staged.clear();
        Ok(())
    }

    pub fn get_entry(&self, namespace: &str, collection: Collection, tid: &Tid) -> RepoResult<Option<Cid>> {
        match self.namespaces.get(namespace) {
            Some(ns) => ns.collection(collection).get_entry(tid),
            None => Ok(None),
        }
    }

    /// Read a record value by CID.
    pub fn get_record(&self, cid: &Cid) -> RepoResult<serde_json::Value> {
        let record: RecordNode = self.store.get(cid)?;
        Ok(record.0)
    }

    /// Persist a record value without indexing it.
    pub fn put_record(&self, value: serde_json::Value) -> RepoResult<Cid> {
        Ok(self.store.put(&RecordNode(value))?)
    }

    /// Persist a record and index it under `tid` in one commit.
    pub fn add_record(
        &mut self,
        namespace: &str,
        collection: Collection,
        tid: Tid,
        value: serde_json::Value,
    ) -> RepoResult<Cid> {
        self.check_write(&WriteScope::Entry {
            namespace,
            collection,
        })?;
        let cid = self.put_record(value)?;
        self.add_entry(namespace, collection, tid, cid)?;
        Ok(cid)
    }

    /// Index `cid` under `tid`, creating the namespace on first use.
    pub fn add_entry(
        &mut self,
        namespace: &str,
        collection: Collection,
        tid: Tid,
        cid: Cid,
    ) -> RepoResult<()> {
        self.write(&[WriteOp::add(namespace, collection, tid, cid)])
    }

    pub fn edit_entry(
        &mut self,
        namespace: &str,
        collection: Collection,
        tid: Tid,
        cid: Cid,
    ) -> RepoResult<()> {
        self.write(&[WriteOp::edit(namespace, collection, tid, cid)])
    }

    pub fn delete_entry(&mut self, namespace: &str, collection: Collection, tid: Tid) -> RepoResult<()> {
        self.write(&[WriteOp::delete(namespace, collection, tid)])
    }

    /// Drop a namespace and everything indexed in it.
    pub fn delete_namespace(&mut self, namespace: &str) -> RepoResult<()> {
        self.write(&[WriteOp::DeleteNamespace(namespace.to_string())])
    }

    /// Follow `did`. Returns the follow record CID.
    pub fn follow(&mut self, did: Did, username: impl Into<String>) -> RepoResult<Cid> {
        self.write(&[WriteOp::follow(did.clone(), username)])?;
        self.relationships
            .follows()
            .get(&did)
            .copied()
            .ok_or(RepoError::NotFollowing(did))
    }

    pub fn unfollow(&mut self, did: &Did) -> RepoResult<()> {
        self.write(&[WriteOp::Unfollow(did.clone())])
    }

    /// Queue a write for the next [`Repo::commit_staged`].
    pub fn stage(&mut self, op: WriteOp) -> RepoResult<()> {
        self.check_write(&op.scope())?;
        debug!(op = %op, staged = self.staged.len() + 1, "staged write");
        self.staged.push(op);
        Ok(())
    }

    /// Writes waiting for the next commit, in staging order.
    pub fn staged(&self) -> &[WriteOp] {
        &self.staged
    }

    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    /// Apply every staged write in order and publish them as one commit.
    ///
    /// Either every write lands or none does: on error the head is unchanged
    /// and the staged writes are kept. With nothing staged no commit is made.
    pub fn commit_staged(&mut self) -> RepoResult<Cid> {
        if self.staged.is_empty() {
            return Ok(self.cid);
        }
        let ops = self.staged.clone();
        self.write(&ops)?;
        info!(writes = ops.len(), commit = %self.cid.short_hex(), "committed staged writes");
        self.staged.clear();
        Ok(self.cid)
    }

    /// Apply `ops` to copies of the touched structures, then publish one
    /// commit. Nothing is installed if any op fails.
    fn write(&mut self, ops: &[WriteOp]) -> RepoResult<()> {
        for op in ops {
            self.check_write(&op.scope())?;
        }
        let mut namespaces = self.namespaces.clone();
        let mut relationships = self.relationships.clone();
        let mut touched = BTreeSet::new();
        for op in ops {
            match op {
                WriteOp::Add {
                    namespace,
                    collection,
                    tid,
                    cid,
                } => {
                    let ns = match namespaces.entry(namespace.clone()) {
                        Entry::Occupied(slot) => slot.into_mut(),
                        Entry::Vacant(slot) => slot.insert(Namespace::create(self.store.clone())?),
                    };
                    ns.collection_mut(*collection).add_entry(*tid, *cid)?;
                    touched.insert(namespace.clone());
                }
                WriteOp::Edit {
                    namespace,
                    collection,
                    tid,
                    cid,
                } => {
                    existing_namespace(&mut namespaces, namespace)?
                        .collection_mut(*collection)
                        .edit_entry(*tid, *cid)?;
                    touched.insert(namespace.clone());
                }
                WriteOp::Delete {
                    namespace,
                    collection,
                    tid,
                } => {
                    existing_namespace(&mut namespaces, namespace)?
                        .collection_mut(*collection)
                        .delete_entry(*tid)?;
                    touched.insert(namespace.clone());
                }
                WriteOp::DeleteNamespace(namespace) => {
                    if namespaces.remove(namespace).is_none() {
                        return Err(RepoError::NamespaceNotFound(namespace.clone()));
                    }
                    touched.remove(namespace);
                }
                WriteOp::Follow { did, username } => {
                    relationships.follow(did.clone(), username.clone())?;
                }
                WriteOp::Unfollow(did) => {
                    relationships.unfollow(did)?;
                }
            }
        }
        for id in &touched {
            if let Some(ns) = namespaces.get_mut(id) {
                ns.update_root()?;
            }
        }
        let root = self.next_root(&namespaces, &relationships);
        let signer = self.signer.as_ref().ok_or(RepoError::ReadOnly)?;
        let cid = Self::sign_and_put(&self.store, signer, &root)?;
        debug!(commit = %cid.short_hex(), prev = %self.cid.short_hex(), writes = ops.len(), "new commit");
        self.namespaces = namespaces;
        self.relationships = relationships;
        self.root = root;
        self.cid = cid;
        Ok(())
    }

    /// Namespace, table, record and follow CIDs of the head state, without
    /// commit history.
    pub fn cids(&self) -> RepoResult<Vec<Cid>> {
        let mut all = Vec::new();
        for ns in self.namespaces.values() {
            all.extend(ns.cids()?);
        }
        all.extend(self.relationships.cids());
        Ok(all)
    }

    pub fn missing_cids(&self) -> RepoResult<Vec<Cid>> {
        let mut missing = Vec::new();
        for ns in self.namespaces.values() {
            missing.extend(ns.missing_cids()?);
        }
        for cid in self.relationships.follows().values() {
            if !self.store.has(cid)? {
                missing.push(*cid);
            }
        }
        Ok(missing)
    }

    fn check_write(&self, scope: &WriteScope<'_>) -> RepoResult<()> {
        if self.signer.is_none() {
            return Err(RepoError::ReadOnly);
        }
        if !self.authority.authorize(&self.root.did, scope) {
            return Err(RepoError::Unauthorized(scope.to_string()));
        }
        Ok(())
    }

    /// Root node for a commit over `namespaces` and `relationships`,
    /// chained to the current head.
    fn next_root(&self, namespaces: &BTreeMap<String, Namespace>, relationships: &Relationships) -> RootNode {
        RootNode {
            did: self.root.did.clone(),
            prev: Some(self.cid),
            namespaces: namespaces
                .iter()
                .map(|(id, ns)| (id.clone(), ns.cid()))
                .collect(),
            relationships: relationships.cid(),
        }
    }

    fn sign_and_put(store: &SharedStore, signer: &SigningKey, root: &RootNode) -> RepoResult<Cid> {
        let root_cid = store.put(root)?;
        let commit = CommitNode {
            root: root_cid,
            sig: signer.sign(root_cid.as_bytes()),
        };
        Ok(store.put(&commit)?)
    }
}

fn existing_namespace<'a>(
    namespaces: &'a mut BTreeMap<String, Namespace>,
    namespace: &str,
) -> RepoResult<&'a mut Namespace> {
    namespaces
        .get_mut(namespace)
        .ok_or_else(|| RepoError::NamespaceNotFound(namespace.to_string()))
}

/// Newest key indexed in any collection of any namespace.
fn newest_key(namespaces: &BTreeMap<String, Namespace>) -> RepoResult<Option<Tid>> {
    let mut newest = None;
    for ns in namespaces.values() {
        for collection in Collection::ALL {
            newest = newest.max(ns.collection(collection).newest_key()?);
        }
    }
    Ok(newest)
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("did", &self.root.did)
            .field("cid", &self.cid)
            .field("namespaces", &self.namespaces.len())
            .field("read_only", &self.signer.is_none())
            .field("staged", &self.staged.len())
            .finish()
    }
}
