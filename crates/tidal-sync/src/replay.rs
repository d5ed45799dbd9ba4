//! Verification and replay of a received block set.

use std::collections::BTreeMap;
use std::sync::Arc;

use tidal_repo::{Namespace, Relationships, Repo};
use tidal_store::{BlockStore, BlockStoreExt, CommitNode, OverlayStore, RootNode, SharedStore};
use tidal_types::{Cid, Collection, Did};
use tracing::{debug, info};

use crate::delta::{branch_delta, diff_maps, Change};
use crate::diff::BlockSet;
use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::verifier::CommitVerifier;

/// Verify `blocks` as the continuation of `current_head` and replay them.
///
/// The blocks are staged over `store`. The commit chain is followed from the
/// block set's root back to `current_head` (or to genesis when there is no
/// local head); every commit on it must be owned by `did` and pass
/// `verifier`. Events are derived commit by commit, oldest first. Every
/// record the new head or an event points at must be in the batch or already
/// in `store`. Only once the whole batch has verified are the blocks written
/// to `store` and the events handed to `on_event`, in order. On error nothing
/// is written and no event is emitted.
pub fn load_and_verify_diff<F>(
    store: &SharedStore,
    did: &Did,
    current_head: Option<Cid>,
    blocks: &BlockSet,
    verifier: &dyn CommitVerifier,
    mut on_event: F,
) -> SyncResult<Vec<Event>>
where
    F: FnMut(&Event),
{
    let new_head = blocks.root();
    if current_head == Some(new_head) {
        return Ok(Vec::new());
    }

    let overlay = Arc::new(OverlayStore::new(store.clone()));
    for (cid, block) in blocks.iter() {
        overlay.import_block(cid, block)?;
    }
    let view: SharedStore = overlay.clone();

    let chain = commit_chain(&view, new_head, current_head)?;
    for (cid, commit, root) in &chain {
        if root.did != *did {
            return Err(SyncError::DidMismatch {
                commit: *cid,
                expected: did.clone(),
                actual: root.did.clone(),
            });
        }
        verifier.verify_commit(did, commit)?;
    }
    debug!(commits = chain.len(), head = %new_head.short_hex(), "commit chain verified");

    let mut events = Vec::new();
    let mut prev_root = match current_head {
        Some(head) => {
            let commit: CommitNode = view.get(&head)?;
            Some(view.get::<RootNode>(&commit.root)?)
        }
        None => None,
    };
    for (_, _, root) in chain.into_iter().rev() {
        events.extend(commit_events(&view, prev_root.as_ref(), &root)?);
        prev_root = Some(root);
    }

    let missing = missing_blocks(&view, new_head, &events)?;
    if let Some(first) = missing.first() {
        return Err(SyncError::Verification(format!(
            "{} referenced blocks missing from the batch, first {}",
            missing.len(),
            first.short_hex()
        )));
    }

    let written = overlay.commit()?;
    info!(
        did = %did,
        head = %new_head.short_hex(),
        blocks = written,
        events = events.len(),
        "applied diff"
    );
    for event in &events {
        on_event(event);
    }
    Ok(events)
}

/// Commits from `head` back to, but excluding, `stop`, newest first.
fn commit_chain(
    store: &SharedStore,
    head: Cid,
    stop: Option<Cid>,
) -> SyncResult<Vec<(Cid, CommitNode, RootNode)>> {
    let mut chain = Vec::new();
    let mut cursor = head;
    loop {
        let commit: CommitNode = store.get(&cursor)?;
        let root: RootNode = store.get(&commit.root)?;
        let prev = root.prev;
        chain.push((cursor, commit, root));
        if prev == stop {
            return Ok(chain);
        }
        match prev {
            Some(cid) => cursor = cid,
            None => return Err(SyncError::ChainBroken { head }),
        }
    }
}

/// Blocks referenced by the state at `head` or by `events` that `store`
/// cannot resolve.
fn missing_blocks(store: &SharedStore, head: Cid, events: &[Event]) -> SyncResult<Vec<Cid>> {
    let mut missing = Repo::load(store.clone(), head)?.missing_cids()?;
    for cid in events.iter().filter_map(Event::cid) {
        if !missing.contains(&cid) && !store.has(&cid)? {
            missing.push(cid);
        }
    }
    Ok(missing)
}

/// Events for one commit: namespace deletes, namespace adds, namespace
/// updates, then relationship changes.
pub fn commit_events(
    store: &SharedStore,
    prev: Option<&RootNode>,
    curr: &RootNode,
) -> SyncResult<Vec<Event>> {
    let empty = BTreeMap::new();
    let prev_namespaces = prev.map(|r| &r.namespaces).unwrap_or(&empty);
    let changes = diff_maps(prev_namespaces, &curr.namespaces);

    let mut events = Vec::new();
    for change in &changes {
        if let Change::Deleted { key, .. } = change {
            events.push(Event::DeletedNamespace {
                namespace: key.clone(),
            });
        }
    }
    for change in &changes {
        if let Change::Added { key, new } = change {
            let ns = Namespace::load(store.clone(), *new)?;
            for collection in Collection::ALL {
                for (tid, cid) in ns.collection(collection).entry_map()? {
                    events.push(Event::AddedObject {
                        namespace: key.clone(),
                        collection,
                        tid,
                        cid,
                    });
                }
            }
        }
    }
    for change in &changes {
        if let Change::Updated { key, old, new } = change {
            let old_ns = Namespace::load(store.clone(), *old)?;
            let new_ns = Namespace::load(store.clone(), *new)?;
            for collection in Collection::ALL {
                let delta = branch_delta(old_ns.collection(collection), new_ns.collection(collection))?;
                events.extend(delta.into_iter().map(|c| object_event(key, collection, c)));
            }
        }
    }

    let prev_rel = prev.map(|r| r.relationships);
    if prev_rel != Some(curr.relationships) {
        let old_follows = match prev_rel {
            Some(cid) => Relationships::load(store.clone(), cid)?.follows().clone(),
            None => BTreeMap::new(),
        };
        let new_follows = Relationships::load(store.clone(), curr.relationships)?;
        events.extend(relationship_events(&old_follows, new_follows.follows()));
    }

    Ok(events)
}

fn object_event(namespace: &str, collection: Collection, change: Change<tidal_types::Tid, Cid>) -> Event {
    let namespace = namespace.to_string();
    match change {
        Change::Added { key, new } => Event::AddedObject {
            namespace,
            collection,
            tid: key,
            cid: new,
        },
        Change::Updated { key, old, new } => Event::UpdatedObject {
            namespace,
            collection,
            tid: key,
            cid: new,
            prev: old,
        },
        Change::Deleted { key, .. } => Event::DeletedObject {
            namespace,
            collection,
            tid: key,
        },
    }
}

fn relationship_events(old: &BTreeMap<Did, Cid>, new: &BTreeMap<Did, Cid>) -> Vec<Event> {
    let changes = diff_maps(old, new);
    let mut added = Vec::new();
    let mut updated = Vec::new();
    let mut deleted = Vec::new();
    for change in changes {
        match change {
            Change::Added { key, new } => added.push(Event::AddedRelationship { did: key, cid: new }),
            Change::Updated { key, old, new } => updated.push(Event::UpdatedRelationship {
                did: key,
                cid: new,
                prev: old,
            }),
            Change::Deleted { key, .. } => deleted.push(Event::DeletedRelationship { did: key }),
        }
    }
    added.into_iter().chain(updated).chain(deleted).collect()
}
