use std::collections::BTreeMap;

use tidal_types::{Cid, Collection, Did, Tid};

use crate::event::Event;

/// Downstream index materialized from replayed events.
///
/// Applying the same event twice leaves the projection unchanged, so a
/// consumer can safely re-run a batch after a crash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordProjection {
    objects: BTreeMap<(String, Collection, Tid), Cid>,
    follows: BTreeMap<Did, Cid>,
}

impl RecordProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns `true` if the projection changed.
    pub fn apply(&mut self, event: &Event) -> bool {
        match event {
            Event::AddedObject {
                namespace,
                collection,
                tid,
                cid,
            }
            | Event::UpdatedObject {
                namespace,
                collection,
                tid,
                cid,
                ..
            } => {
                let key = (namespace.clone(), *collection, *tid);
                self.objects.insert(key, *cid) != Some(*cid)
            }
            Event::DeletedObject {
                namespace,
                collection,
                tid,
            } => self
                .objects
                .remove(&(namespace.clone(), *collection, *tid))
                .is_some(),
            Event::DeletedNamespace { namespace } => {
                let before = self.objects.len();
                self.objects.retain(|(ns, _, _), _| ns != namespace);
                self.objects.len() != before
            }
            Event::AddedRelationship { did, cid } | Event::UpdatedRelationship { did, cid, .. } => {
                self.follows.insert(did.clone(), *cid) != Some(*cid)
            }
            Event::DeletedRelationship { did } => self.follows.remove(did).is_some(),
        }
    }

    /// Apply a batch in order. Returns how many events changed the projection.
    pub fn apply_all<'a, I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = &'a Event>,
    {
        events.into_iter().filter(|e| self.apply(e)).count()
    }

    pub fn get(&self, namespace: &str, collection: Collection, tid: &Tid) -> Option<Cid> {
        self.objects
            .get(&(namespace.to_string(), collection, *tid))
            .copied()
    }

    /// Entries of one collection, ascending by key.
    pub fn entries(&self, namespace: &str, collection: Collection) -> Vec<(Tid, Cid)> {
        self.objects
            .iter()
            .filter(|((ns, c, _), _)| ns == namespace && *c == collection)
            .map(|((_, _, tid), cid)| (*tid, *cid))
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_following(&self, did: &Did) -> bool {
        self.follows.contains_key(did)
    }

    pub fn follows(&self) -> &BTreeMap<Did, Cid> {
        &self.follows
    }
}
