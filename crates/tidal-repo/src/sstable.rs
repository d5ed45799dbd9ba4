use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tidal_store::{BlockStore, BlockStoreExt, SharedStore, TableNode};
use tidal_types::{Cid, Tid};
use tracing::debug;

use crate::error::{RepoError, RepoResult};

/// Size tier of an SSTable, derived from its entry count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSize {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl TableSize {
    pub const ALL: [TableSize; 4] = [
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::ExtraLarge,
    ];

    /// Maximum number of entries a table of this tier holds.
    pub const fn capacity(self) -> usize {
        match self {
            Self::Small => 100,
            Self::Medium => 400,
            Self::Large => 1600,
            Self::ExtraLarge => 6400,
        }
    }

    /// The smallest tier whose capacity covers `count` entries.
    ///
    /// Counts beyond the extra-large capacity still classify as extra-large.
    pub fn for_count(count: usize) -> Self {
        Self::ALL
            .into_iter()
            .find(|tier| count <= tier.capacity())
            .unwrap_or(Self::ExtraLarge)
    }

    /// Whether this is the terminal tier. Extra-large tables never merge.
    pub fn is_max(self) -> bool {
        self == Self::ExtraLarge
    }
}

impl std::fmt::Display for TableSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
            Self::ExtraLarge => write!(f, "extra-large"),
        }
    }
}

/// A content-addressed mapping from entry key to record CID.
///
/// Every mutation re-persists the table, so `cid()` always names the
/// current contents. The size tier is never stored; it is recomputed from
/// the entry count.
#[derive(Clone)]
pub struct SsTable {
    store: SharedStore,
    cid: Cid,
    data: BTreeMap<Tid, Cid>,
}

impl SsTable {
    /// Persist an empty table.
    pub fn create(store: SharedStore) -> RepoResult<Self> {
        Self::from_entries(store, BTreeMap::new())
    }

    /// Load a persisted table.
    pub fn load(store: SharedStore, cid: Cid) -> RepoResult<Self> {
        let node: TableNode = store.get(&cid)?;
        Ok(Self {
            store,
            cid,
            data: node.entries,
        })
    }

    fn from_entries(store: SharedStore, data: BTreeMap<Tid, Cid>) -> RepoResult<Self> {
        let mut table = Self {
            store,
            cid: Cid::from_hash([0u8; 32]),
            data,
        };
        table.persist()?;
        Ok(table)
    }

    fn persist(&mut self) -> RepoResult<()> {
        let node = TableNode {
            entries: self.data.clone(),
        };
        self.cid = self.store.put(&node)?;
        debug!(cid = %self.cid.short_hex(), entries = self.data.len(), "persisted sstable");
        Ok(())
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// Current size tier.
    pub fn size(&self) -> TableSize {
        TableSize::for_count(self.data.len())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.size().capacity()
    }

    pub fn get_entry(&self, tid: &Tid) -> Option<Cid> {
        self.data.get(tid).copied()
    }

    pub fn has_entry(&self, tid: &Tid) -> bool {
        self.data.contains_key(tid)
    }

    /// Insert one entry.
    pub fn add_entry(&mut self, tid: Tid, cid: Cid) -> RepoResult<()> {
        if self.is_full() {
            return Err(RepoError::TableFull {
                capacity: self.size().capacity(),
            });
        }
        if self.data.contains_key(&tid) {
            return Err(RepoError::DuplicateKey(tid));
        }
        self.data.insert(tid, cid);
        self.persist()
    }

    /// Insert a batch. Either every entry is added or none is.
    ///
    /// The batch may carry the table past its current tier, up to the
    /// extra-large capacity.
    pub fn add_entries<I>(&mut self, batch: I) -> RepoResult<()>
    where
        I: IntoIterator<Item = (Tid, Cid)>,
    {
        let mut staged = self.data.clone();
        for (tid, cid) in batch {
            if staged.insert(tid, cid).is_some() {
                return Err(RepoError::DuplicateKey(tid));
            }
        }
        let ceiling = TableSize::ExtraLarge.capacity();
        if staged.len() > ceiling {
            return Err(RepoError::TableFull { capacity: ceiling });
        }
        self.data = staged;
        self.persist()
    }

    /// Point an existing key at a new CID.
    pub fn edit_entry(&mut self, tid: Tid, cid: Cid) -> RepoResult<()> {
        match self.data.get_mut(&tid) {
            Some(slot) => *slot = cid,
            None => return Err(RepoError::KeyNotFound(tid)),
        }
        self.persist()
    }

    /// Remove a key, returning the CID it pointed at.
    pub fn remove_entry(&mut self, tid: Tid) -> RepoResult<Cid> {
        let removed = self.data.remove(&tid).ok_or(RepoError::KeyNotFound(tid))?;
        self.persist()?;
        Ok(removed)
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<(Tid, Cid)> {
        self.data.iter().rev().map(|(t, c)| (*t, *c)).collect()
    }

    /// Entries in ascending key order.
    pub fn data(&self) -> &BTreeMap<Tid, Cid> {
        &self.data
    }

    pub fn oldest_tid(&self) -> Option<Tid> {
        self.data.keys().next().copied()
    }

    pub fn newest_tid(&self) -> Option<Tid> {
        self.data.keys().next_back().copied()
    }

    /// The table's own CID followed by every record CID it references.
    pub fn cids(&self) -> Vec<Cid> {
        std::iter::once(self.cid)
            .chain(self.data.values().copied())
            .collect()
    }

    /// Record CIDs not present in the store.
    pub fn missing_cids(&self) -> RepoResult<Vec<Cid>> {
        let mut missing = Vec::new();
        for cid in self.data.values() {
            if !self.store.has(cid)? {
                missing.push(*cid);
            }
        }
        Ok(missing)
    }

    /// Union several tables into a freshly persisted one.
    ///
    /// Inputs must cover disjoint key ranges; a key present in two inputs is
    /// a [`RepoError::MergeConflict`]. The result's tier is recomputed from
    /// the merged size, and its CID depends only on the merged content.
    pub fn merge<I>(first: SsTable, rest: I) -> RepoResult<SsTable>
    where
        I: IntoIterator<Item = SsTable>,
    {
        let store = first.store.clone();
        let mut data = first.data;
        let mut inputs = 1usize;
        for table in rest {
            inputs += 1;
            for (tid, cid) in table.data {
                if data.insert(tid, cid).is_some() {
                    return Err(RepoError::MergeConflict(tid));
                }
            }
        }
        let merged = Self::from_entries(store, data)?;
        debug!(
            inputs,
            entries = merged.len(),
            tier = %merged.size(),
            cid = %merged.cid.short_hex(),
            "merged sstables"
        );
        Ok(merged)
    }
}

impl std::fmt::Debug for SsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsTable")
            .field("cid", &self.cid)
            .field("entries", &self.data.len())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tidal_store::{BlockStore, InMemoryBlockStore, IndexNode, StoreError};

    use super::*;

    fn store() -> SharedStore {
        Arc::new(InMemoryBlockStore::new())
    }

    fn tid(n: u64) -> Tid {
        Tid::new(1_700_000_000_000_000 + n, 0)
    }

    fn rec(n: u64) -> Cid {
        Cid::from_bytes(&n.to_be_bytes())
    }

    fn filled(store: &SharedStore, range: std::ops::Range<u64>) -> SsTable {
        let mut table = SsTable::create(store.clone()).unwrap();
        table.add_entries(range.map(|n| (tid(n), rec(n)))).unwrap();
        table
    }

    // -----------------------------------------------------------------------
    // Tiers
    // -----------------------------------------------------------------------

    #[test]
    fn tier_thresholds() {
        assert_eq!(TableSize::for_count(0), TableSize::Small);
        assert_eq!(TableSize::for_count(100), TableSize::Small);
        assert_eq!(TableSize::for_count(101), TableSize::Medium);
        assert_eq!(TableSize::for_count(400), TableSize::Medium);
        assert_eq!(TableSize::for_count(401), TableSize::Large);
        assert_eq!(TableSize::for_count(1600), TableSize::Large);
        assert_eq!(TableSize::for_count(1601), TableSize::ExtraLarge);
        assert_eq!(TableSize::for_count(6400), TableSize::ExtraLarge);
        assert!(TableSize::ExtraLarge.is_max());
        assert!(!TableSize::Large.is_max());
    }

    // -----------------------------------------------------------------------
    // Create / load
    // -----------------------------------------------------------------------

    #[test]
    fn create_is_empty_small() {
        let table = SsTable::create(store()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.size(), TableSize::Small);
        assert!(!table.is_full());
        assert!(table.oldest_tid().is_none());
    }

    #[test]
    fn load_roundtrip() {
        let s = store();
        let table = filled(&s, 0..10);
        let loaded = SsTable::load(s, table.cid()).unwrap();
        assert_eq!(loaded.data(), table.data());
        assert_eq!(loaded.cid(), table.cid());
    }

    #[test]
    fn load_of_index_block_is_shape_mismatch() {
        let s = store();
        let cid = s.put(&IndexNode::default()).unwrap();
        let err = SsTable::load(s, cid).unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::ShapeMismatch { .. })));
    }

    #[test]
    fn load_of_garbage_is_decode_error() {
        let s = store();
        let block = tidal_store::Block::new(tidal_store::BlockKind::Table, b"[1,2,3]".to_vec());
        let cid = s.put_block(&block).unwrap();
        let err = SsTable::load(s, cid).unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::Decode { .. })));
    }

    #[test]
    fn load_missing_is_not_found() {
        let err = SsTable::load(store(), Cid::from_bytes(b"nope")).unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::NotFound(_))));
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    #[test]
    fn add_entry_changes_cid() {
        let mut table = SsTable::create(store()).unwrap();
        let before = table.cid();
        table.add_entry(tid(1), rec(1)).unwrap();
        assert_ne!(table.cid(), before);
        assert_eq!(table.get_entry(&tid(1)), Some(rec(1)));
    }

    #[test]
    fn add_duplicate_fails() {
        let mut table = SsTable::create(store()).unwrap();
        table.add_entry(tid(1), rec(1)).unwrap();
        let err = table.add_entry(tid(1), rec(2)).unwrap_err();
        assert!(matches!(err, RepoError::DuplicateKey(t) if t == tid(1)));
    }

    #[test]
    fn full_small_table_rejects_add() {
        let s = store();
        let mut table = SsTable::create(s).unwrap();
        for n in 0..100 {
            table.add_entry(tid(n), rec(n)).unwrap();
        }
        assert!(table.is_full());
        assert_eq!(table.size(), TableSize::Small);
        let err = table.add_entry(tid(100), rec(100)).unwrap_err();
        assert!(matches!(err, RepoError::TableFull { capacity: 100 }));
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let s = store();
        let mut table = filled(&s, 0..5);
        let before = table.cid();
        let err = table
            .add_entries([(tid(10), rec(10)), (tid(3), rec(3))])
            .unwrap_err();
        assert!(matches!(err, RepoError::DuplicateKey(t) if t == tid(3)));
        assert_eq!(table.cid(), before);
        assert!(!table.has_entry(&tid(10)));
    }

    #[test]
    fn batch_cannot_pass_extra_large() {
        let s = store();
        let mut table = filled(&s, 0..6400);
        assert_eq!(table.size(), TableSize::ExtraLarge);
        assert!(table.is_full());
        let err = table.add_entries([(tid(9000), rec(9000))]).unwrap_err();
        assert!(matches!(err, RepoError::TableFull { capacity: 6400 }));
    }

    #[test]
    fn edit_and_remove() {
        let s = store();
        let mut table = filled(&s, 0..3);
        table.edit_entry(tid(1), rec(99)).unwrap();
        assert_eq!(table.get_entry(&tid(1)), Some(rec(99)));
        assert_eq!(table.remove_entry(tid(1)).unwrap(), rec(99));
        assert!(!table.has_entry(&tid(1)));
        assert!(matches!(
            table.edit_entry(tid(1), rec(1)),
            Err(RepoError::KeyNotFound(_))
        ));
        assert!(matches!(
            table.remove_entry(tid(50)),
            Err(RepoError::KeyNotFound(_))
        ));
    }

    #[test]
    fn entries_newest_first() {
        let s = store();
        let table = filled(&s, 0..4);
        let keys: Vec<Tid> = table.entries().into_iter().map(|(t, _)| t).collect();
        assert_eq!(keys, vec![tid(3), tid(2), tid(1), tid(0)]);
        assert_eq!(table.oldest_tid(), Some(tid(0)));
        assert_eq!(table.newest_tid(), Some(tid(3)));
    }

    #[test]
    fn cids_lead_with_table_cid() {
        let s = store();
        let table = filled(&s, 0..2);
        assert_eq!(table.cids(), vec![table.cid(), rec(0), rec(1)]);
        assert_eq!(table.missing_cids().unwrap(), vec![rec(0), rec(1)]);
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[test]
    fn merge_four_small_gives_medium() {
        let s = store();
        let tables: Vec<SsTable> = (0..4).map(|i| filled(&s, i * 100..(i + 1) * 100)).collect();
        let mut iter = tables.into_iter();
        let first = iter.next().unwrap();
        let merged = SsTable::merge(first, iter).unwrap();
        assert_eq!(merged.len(), 400);
        assert_eq!(merged.size(), TableSize::Medium);
        assert!(merged.is_full());
        let reloaded = SsTable::load(s, merged.cid()).unwrap();
        assert_eq!(reloaded.len(), 400);
    }

    #[test]
    fn merge_conflict_detected() {
        let s = store();
        let a = filled(&s, 0..10);
        let b = filled(&s, 5..15);
        let err = SsTable::merge(a, [b]).unwrap_err();
        assert!(matches!(err, RepoError::MergeConflict(t) if t == tid(5)));
    }

    #[test]
    fn merge_is_order_independent() {
        let s = store();
        let parts: Vec<SsTable> = (0..4).map(|i| filled(&s, i * 10..(i + 1) * 10)).collect();
        let forward = SsTable::merge(parts[0].clone(), parts[1..].to_vec()).unwrap();
        let backward = SsTable::merge(
            parts[3].clone(),
            vec![parts[1].clone(), parts[2].clone(), parts[0].clone()],
        )
        .unwrap();
        assert_eq!(forward.data(), backward.data());
        assert_eq!(forward.cid(), backward.cid());
    }

    #[test]
    fn merge_single_table_is_copy() {
        let s = store();
        let a = filled(&s, 0..3);
        let merged = SsTable::merge(a.clone(), Vec::new()).unwrap();
        assert_eq!(merged.cid(), a.cid());
    }
}
