use std::collections::BTreeMap;

use tidal_store::{BlockStore, BlockStoreExt, IndexNode, SharedStore};
use tidal_types::{Cid, Tid};
use tracing::{debug, info};

use crate::error::{RepoError, RepoResult};
use crate::sstable::{SsTable, TableSize};

/// The mutable index of SSTables for one collection.
///
/// Tables are named by their oldest entry key. The newest-named table is the
/// current table and the only one that accepts new writes. When it fills up,
/// [`Branch::compress`] runs the 4-way cascade before a fresh table opens.
#[derive(Clone)]
pub struct Branch {
    store: SharedStore,
    cid: Cid,
    index: BTreeMap<Tid, Cid>,
}

impl Branch {
    /// Persist an empty branch.
    pub fn create(store: SharedStore) -> RepoResult<Self> {
        let cid = store.put(&IndexNode::default())?;
        Ok(Self {
            store,
            cid,
            index: BTreeMap::new(),
        })
    }

    /// Load a persisted branch index.
    pub fn load(store: SharedStore, cid: Cid) -> RepoResult<Self> {
        let node: IndexNode = store.get(&cid)?;
        Ok(Self {
            store,
            cid,
            index: node.tables,
        })
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// Table name → table CID, ascending by name.
    pub fn index(&self) -> &BTreeMap<Tid, Cid> {
        &self.index
    }

    fn persist(&mut self) -> RepoResult<()> {
        let node = IndexNode {
            tables: self.index.clone(),
        };
        self.cid = self.store.put(&node)?;
        debug!(cid = %self.cid.short_hex(), tables = self.index.len(), "persisted branch");
        Ok(())
    }

    /// Load the table indexed under `name`, if any.
    pub fn get_table(&self, name: &Tid) -> RepoResult<Option<SsTable>> {
        match self.index.get(name) {
            Some(cid) => Ok(Some(SsTable::load(self.store.clone(), *cid)?)),
            None => Ok(None),
        }
    }

    /// Name of the table whose range covers `tid`: the newest name not newer
    /// than it.
    pub fn table_name_for_tid(&self, tid: &Tid) -> Option<Tid> {
        self.index.range(..=*tid).next_back().map(|(name, _)| *name)
    }

    pub fn get_table_for_tid(&self, tid: &Tid) -> RepoResult<Option<SsTable>> {
        match self.table_name_for_tid(tid) {
            Some(name) => self.get_table(&name),
            None => Ok(None),
        }
    }

    /// Table names, newest first.
    pub fn table_names(&self) -> Vec<Tid> {
        self.index.keys().rev().copied().collect()
    }

    pub fn table_count(&self) -> usize {
        self.index.len()
    }

    pub fn get_entry(&self, tid: &Tid) -> RepoResult<Option<Cid>> {
        Ok(self
            .get_table_for_tid(tid)?
            .and_then(|table| table.get_entry(tid)))
    }

    /// Up to `count` entries newest first, strictly older than `from` when
    /// given.
    pub fn get_entries(&self, count: usize, from: Option<Tid>) -> RepoResult<Vec<(Tid, Cid)>> {
        let mut out = Vec::new();
        let names: Vec<Tid> = match from {
            Some(from) => self.index.range(..=from).rev().map(|(n, _)| *n).collect(),
            None => self.table_names(),
        };
        for name in names {
            if out.len() >= count {
                break;
            }
            let table = self
                .get_table(&name)?
                .ok_or(RepoError::KeyNotFound(name))?;
            let remaining = count - out.len();
            out.extend(
                table
                    .entries()
                    .into_iter()
                    .filter(|(tid, _)| from.map_or(true, |from| tid.older_than(&from)))
                    .take(remaining),
            );
        }
        Ok(out)
    }

    /// The newest live key or the newest table name, whichever is later.
    pub fn newest_key(&self) -> RepoResult<Option<Tid>> {
        let name = self.index.keys().next_back().copied();
        let entry = self.get_entries(1, None)?.first().map(|(tid, _)| *tid);
        Ok(name.max(entry))
    }

    /// Every entry, newest first.
    pub fn get_all_entries(&self) -> RepoResult<Vec<(Tid, Cid)>> {
        self.get_entries(usize::MAX, None)
    }

    /// Every entry, ascending by key.
    pub fn entry_map(&self) -> RepoResult<BTreeMap<Tid, Cid>> {
        let mut all = BTreeMap::new();
        for cid in self.index.values() {
            let table = SsTable::load(self.store.clone(), *cid)?;
            all.extend(table.data().iter().map(|(t, c)| (*t, *c)));
        }
        Ok(all)
    }

    /// The table new writes go to, plus the name it is indexed under.
    ///
    /// A full head table triggers [`Branch::compress`] and yields a fresh,
    /// not yet indexed table (`None` name).
    pub fn get_or_create_current_table(&mut self) -> RepoResult<(Option<Tid>, SsTable)> {
        let head = self.index.iter().next_back().map(|(n, c)| (*n, *c));
        let Some((name, cid)) = head else {
            return Ok((None, SsTable::create(self.store.clone())?));
        };
        let table = SsTable::load(self.store.clone(), cid)?;
        if !table.is_full() {
            return Ok((Some(name), table));
        }
        self.compress()?;
        Ok((None, SsTable::create(self.store.clone())?))
    }

    /// Append an entry under a key newer than everything already sealed.
    pub fn add_entry(&mut self, tid: Tid, cid: Cid) -> RepoResult<()> {
        if let Some(floor) = self.sealed_floor()? {
            if !tid.newer_than(&floor) {
                return Err(RepoError::KeyTooOld { key: tid, floor });
            }
        }
        let (name, mut table) = self.get_or_create_current_table()?;
        if let Some(name) = name {
            if tid.older_than(&name) {
                return Err(RepoError::KeyTooOld {
                    key: tid,
                    floor: name,
                });
            }
        }
        table.add_entry(tid, cid)?;
        self.index.insert(name.unwrap_or(tid), table.cid());
        self.persist()
    }

    /// Newest key of the head table when that table is full.
    ///
    /// A full head is about to be sealed, so a key for the next table must be
    /// newer than everything in it.
    fn sealed_floor(&self) -> RepoResult<Option<Tid>> {
        let Some((_, cid)) = self.index.iter().next_back() else {
            return Ok(None);
        };
        let table = SsTable::load(self.store.clone(), *cid)?;
        Ok(if table.is_full() {
            table.newest_tid()
        } else {
            None
        })
    }

    /// Point an existing entry at a new CID.
    pub fn edit_entry(&mut self, tid: Tid, cid: Cid) -> RepoResult<()> {
        self.edit_table_for_tid(tid, |table| table.edit_entry(tid, cid))
    }

    /// Remove an entry. The table keeps its name even if it becomes empty.
    pub fn delete_entry(&mut self, tid: Tid) -> RepoResult<Cid> {
        let mut removed = None;
        self.edit_table_for_tid(tid, |table| {
            removed = Some(table.remove_entry(tid)?);
            Ok(())
        })?;
        removed.ok_or(RepoError::KeyNotFound(tid))
    }

    fn edit_table_for_tid<F>(&mut self, tid: Tid, edit: F) -> RepoResult<()>
    where
        F: FnOnce(&mut SsTable) -> RepoResult<()>,
    {
        let name = self
            .table_name_for_tid(&tid)
            .ok_or(RepoError::KeyNotFound(tid))?;
        let mut table = self.get_table(&name)?.ok_or(RepoError::KeyNotFound(tid))?;
        edit(&mut table)?;
        self.index.insert(name, table.cid());
        self.persist()
    }

    /// Run the compaction cascade on the head table.
    ///
    /// Does nothing unless the head table is full. The head (name `N0`) is
    /// taken out of the index. While the next three
    /// tables share its tier and that tier is below extra-large, the four
    /// are merged and the result is carried one tier up under the oldest
    /// consumed name. The final table is indexed under the last carried
    /// name. The cascade runs on a copy of the index, which is installed
    /// only once every merge has been persisted.
    pub fn compress(&mut self) -> RepoResult<()> {
        let mut index = self.index.clone();
        let Some((head_name, head_cid)) = index.pop_last() else {
            return Ok(());
        };
        let mut current = SsTable::load(self.store.clone(), head_cid)?;
        if !current.is_full() {
            debug!(entries = current.len(), tier = %current.size(), "head table not full, skipping compaction");
            return Ok(());
        }
        let mut name = head_name;
        let mut merges = 0usize;

        loop {
            let tier = current.size();
            if tier.is_max() {
                debug!(tier = %tier, "cascade stopped at ceiling");
                break;
            }
            let candidates: Vec<(Tid, Cid)> = index
                .range(..name)
                .rev()
                .take(3)
                .map(|(n, c)| (*n, *c))
                .collect();
            if candidates.len() < 3 {
                debug!(tier = %tier, candidates = candidates.len(), "cascade stopped: too few tables");
                break;
            }
            let mut siblings = Vec::with_capacity(3);
            for (_, cid) in &candidates {
                let table = SsTable::load(self.store.clone(), *cid)?;
                if table.size() == tier {
                    siblings.push(table);
                }
            }
            if siblings.len() < 3 {
                debug!(tier = %tier, matching = siblings.len(), "cascade stopped: tiers differ");
                break;
            }
            for (n, _) in &candidates {
                index.remove(n);
            }
            current = SsTable::merge(current, siblings)?;
            name = candidates[2].0;
            merges += 1;
        }

        index.insert(name, current.cid());
        self.index = index;
        self.persist()?;
        if merges > 0 {
            info!(
                merges,
                tier = %current.size(),
                tables = self.index.len(),
                "branch compacted"
            );
        }
        Ok(())
    }

    /// Table CIDs.
    pub fn shallow_cids(&self) -> Vec<Cid> {
        self.index.values().copied().collect()
    }

    /// Every table CID and every record CID reachable from this branch.
    pub fn cids(&self) -> RepoResult<Vec<Cid>> {
        let mut all = Vec::new();
        for cid in self.index.values() {
            all.extend(SsTable::load(self.store.clone(), *cid)?.cids());
        }
        Ok(all)
    }

    /// Table or record CIDs referenced by this branch but absent from the store.
    pub fn missing_cids(&self) -> RepoResult<Vec<Cid>> {
        let mut missing = Vec::new();
        for cid in self.index.values() {
            if self.store.has(cid)? {
                missing.extend(SsTable::load(self.store.clone(), *cid)?.missing_cids()?);
            } else {
                missing.push(*cid);
            }
        }
        Ok(missing)
    }

    /// Tier of every table, newest first.
    pub fn tiers(&self) -> RepoResult<Vec<TableSize>> {
        self.index
            .values()
            .rev()
            .map(|cid| Ok(SsTable::load(self.store.clone(), *cid)?.size()))
            .collect()
    }
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("cid", &self.cid)
            .field("tables", &self.index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use proptest::prelude::*;
    use tidal_store::{BlockStore, InMemoryBlockStore, TableNode};

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

    fn fill(branch: &mut Branch, range: std::ops::Range<u64>) {
        for n in range {
            branch.add_entry(tid(n), rec(n)).unwrap();
        }
    }

    fn sizes(branch: &Branch) -> Vec<usize> {
        branch
            .index()
            .values()
            .rev()
            .map(|cid| SsTable::load(branch.store.clone(), *cid).unwrap().len())
            .collect()
    }

    fn assert_unique_keys(branch: &Branch) {
        let mut seen = HashSet::new();
        for cid in branch.index().values() {
            let table = SsTable::load(branch.store.clone(), *cid).unwrap();
            for tid in table.data().keys() {
                assert!(seen.insert(*tid), "key {tid} in two tables");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Create / load
    // -----------------------------------------------------------------------

    #[test]
    fn load_of_created_branch_is_empty() {
        let s = store();
        let created = Branch::create(s.clone()).unwrap();
        let loaded = Branch::load(s, created.cid()).unwrap();
        assert!(loaded.index().is_empty());
        assert_eq!(loaded.table_count(), 0);
    }

    #[test]
    fn load_of_table_block_is_shape_mismatch() {
        let s = store();
        let cid = s.put(&TableNode::default()).unwrap();
        assert!(matches!(
            Branch::load(s, cid),
            Err(RepoError::Store(tidal_store::StoreError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn reload_after_writes_matches() {
        let s = store();
        let mut branch = Branch::create(s.clone()).unwrap();
        fill(&mut branch, 0..150);
        let loaded = Branch::load(s, branch.cid()).unwrap();
        assert_eq!(loaded.index(), branch.index());
        assert_eq!(loaded.get_all_entries().unwrap().len(), 150);
    }

    // -----------------------------------------------------------------------
    // Writing and naming
    // -----------------------------------------------------------------------

    #[test]
    fn first_entry_names_table() {
        let mut branch = Branch::create(store()).unwrap();
        branch.add_entry(tid(5), rec(5)).unwrap();
        branch.add_entry(tid(6), rec(6)).unwrap();
        assert_eq!(branch.table_names(), vec![tid(5)]);
    }

    #[test]
    fn overflow_seals_first_table() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..101);

        assert_eq!(branch.table_names(), vec![tid(100), tid(0)]);
        let sealed = branch.get_table(&tid(0)).unwrap().unwrap();
        assert_eq!(sealed.len(), 100);
        assert!(sealed.is_full());
        assert_eq!(sealed.size(), TableSize::Small);
        let current = branch.get_table(&tid(100)).unwrap().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current.size(), TableSize::Small);
    }

    #[test]
    fn four_full_small_tables_before_merge() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..400);
        assert_eq!(sizes(&branch), vec![100, 100, 100, 100]);
    }

    #[test]
    fn fifth_table_triggers_one_merge() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..401);

        assert_eq!(sizes(&branch), vec![1, 400]);
        assert_eq!(branch.table_names(), vec![tid(400), tid(0)]);
        assert_eq!(
            branch.tiers().unwrap(),
            vec![TableSize::Small, TableSize::Medium]
        );
        assert_eq!(branch.get_all_entries().unwrap().len(), 401);
        assert_unique_keys(&branch);
    }

    #[test]
    fn three_siblings_do_not_merge() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..301);
        assert_eq!(sizes(&branch), vec![1, 100, 100, 100]);
    }

    #[test]
    fn cascade_climbs_two_tiers() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..1601);
        assert_eq!(sizes(&branch), vec![1, 1600]);
        assert_eq!(branch.tiers().unwrap()[1], TableSize::Large);
        assert_eq!(branch.table_names()[1], tid(0));
    }

    #[test]
    fn mixed_tiers_stop_the_cascade() {
        let mut branch = Branch::create(store()).unwrap();
        // medium(400) + three small
        fill(&mut branch, 0..701);
        assert_eq!(sizes(&branch), vec![1, 100, 100, 100, 400]);
        // the next overflow merges the four smalls, then finds only one
        // medium sibling and stops.
        fill(&mut branch, 701..801);
        assert_eq!(sizes(&branch), vec![1, 400, 400]);
        assert_unique_keys(&branch);
    }

    #[test]
    fn extra_large_never_merges() {
        let s = store();
        let mut branch = Branch::create(s.clone()).unwrap();
        for i in 0..4u64 {
            let mut table = SsTable::create(s.clone()).unwrap();
            table
                .add_entries((i * 6400..(i + 1) * 6400).map(|n| (tid(n), rec(n))))
                .unwrap();
            branch.index.insert(tid(i * 6400), table.cid());
        }
        branch.persist().unwrap();
        let before = branch.index().clone();

        branch.compress().unwrap();
        assert_eq!(branch.index(), &before);

        branch.add_entry(tid(25_600), rec(25_600)).unwrap();
        assert_eq!(branch.table_count(), 5);
        assert_eq!(sizes(&branch), vec![1, 6400, 6400, 6400, 6400]);
    }

    #[test]
    fn key_older_than_current_table_rejected() {
        let mut branch = Branch::create(store()).unwrap();
        branch.add_entry(tid(10), rec(10)).unwrap();
        let err = branch.add_entry(tid(5), rec(5)).unwrap_err();
        assert!(matches!(err, RepoError::KeyTooOld { key, floor } if key == tid(5) && floor == tid(10)));
    }

    #[test]
    fn key_inside_sealed_range_rejected() {
        let mut branch = Branch::create(store()).unwrap();
        for n in 0..100 {
            branch.add_entry(tid(n * 2), rec(n)).unwrap();
        }
        // head is full; 197 is older than its newest key (198)
        let err = branch.add_entry(tid(197), rec(0)).unwrap_err();
        assert!(matches!(err, RepoError::KeyTooOld { floor, .. } if floor == tid(198)));
        assert_eq!(branch.table_count(), 1);
    }

    #[test]
    fn duplicate_in_current_table_rejected() {
        let mut branch = Branch::create(store()).unwrap();
        branch.add_entry(tid(1), rec(1)).unwrap();
        assert!(matches!(
            branch.add_entry(tid(1), rec(2)),
            Err(RepoError::DuplicateKey(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    #[test]
    fn get_entry_across_tables() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..250);
        assert_eq!(branch.get_entry(&tid(42)).unwrap(), Some(rec(42)));
        assert_eq!(branch.get_entry(&tid(249)).unwrap(), Some(rec(249)));
        assert_eq!(branch.get_entry(&tid(1000)).unwrap(), None);
        assert_eq!(
            branch.get_entry(&Tid::new(1, 0)).unwrap(),
            None,
            "older than every table"
        );
    }

    #[test]
    fn get_entries_pages_newest_first() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..250);

        let page = branch.get_entries(5, None).unwrap();
        let keys: Vec<Tid> = page.iter().map(|(t, _)| *t).collect();
        assert_eq!(keys, (245..250).rev().map(tid).collect::<Vec<_>>());

        // crosses a table boundary
        let page = branch.get_entries(4, Some(tid(202))).unwrap();
        let keys: Vec<Tid> = page.iter().map(|(t, _)| *t).collect();
        assert_eq!(keys, vec![tid(201), tid(200), tid(199), tid(198)]);
    }

    #[test]
    fn newest_key_covers_emptied_head() {
        let mut branch = Branch::create(store()).unwrap();
        assert_eq!(branch.newest_key().unwrap(), None);
        fill(&mut branch, 0..101);
        assert_eq!(branch.newest_key().unwrap(), Some(tid(100)));
        // the head keeps its name after losing its only entry
        branch.delete_entry(tid(100)).unwrap();
        assert_eq!(branch.newest_key().unwrap(), Some(tid(100)));
        branch.delete_entry(tid(99)).unwrap();
        assert_eq!(branch.newest_key().unwrap(), Some(tid(100)));
    }

    #[test]
    fn get_entries_from_before_everything_is_empty() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..10);
        assert!(branch.get_entries(10, Some(tid(0))).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Edit / delete
    // -----------------------------------------------------------------------

    #[test]
    fn edit_entry_in_sealed_table() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..150);
        let names = branch.table_names();
        branch.edit_entry(tid(10), rec(999)).unwrap();
        assert_eq!(branch.get_entry(&tid(10)).unwrap(), Some(rec(999)));
        assert_eq!(branch.table_names(), names);
    }

    #[test]
    fn delete_entry_keeps_table_name() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..3);
        assert_eq!(branch.delete_entry(tid(0)).unwrap(), rec(0));
        assert_eq!(branch.get_entry(&tid(0)).unwrap(), None);
        assert_eq!(branch.table_names(), vec![tid(0)]);
        assert!(matches!(
            branch.delete_entry(tid(0)),
            Err(RepoError::KeyNotFound(_))
        ));
    }

    #[test]
    fn edit_missing_is_key_not_found() {
        let mut branch = Branch::create(store()).unwrap();
        assert!(matches!(
            branch.edit_entry(tid(1), rec(1)),
            Err(RepoError::KeyNotFound(_))
        ));
    }

    // -----------------------------------------------------------------------
    // CIDs
    // -----------------------------------------------------------------------

    #[test]
    fn cids_cover_tables_and_records() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..101);
        let cids = branch.cids().unwrap();
        assert_eq!(cids.len(), 2 + 101);
        for cid in branch.shallow_cids() {
            assert!(cids.contains(&cid));
        }
        // records were never written to the store
        assert_eq!(branch.missing_cids().unwrap().len(), 101);
    }

    #[test]
    fn missing_table_reported() {
        let s = store();
        let mut branch = Branch::create(s).unwrap();
        let ghost = Cid::from_bytes(b"ghost table");
        branch.index.insert(tid(0), ghost);
        assert_eq!(branch.missing_cids().unwrap(), vec![ghost]);
    }

    #[test]
    fn compress_failure_leaves_branch_unchanged() {
        let s = store();
        let mut branch = Branch::create(s.clone()).unwrap();
        fill(&mut branch, 0..300);
        // replace a sealed table with a dangling CID
        let victim = branch.table_names()[1];
        branch.index.insert(victim, Cid::from_bytes(b"dangling"));
        fill(&mut branch, 300..400);
        let before = branch.index().clone();
        let root = branch.cid();
        assert!(branch.compress().is_err());
        assert_eq!(branch.index(), &before);
        assert_eq!(branch.cid(), root);
        assert!(s.has(&root).unwrap());
    }

    #[test]
    fn compress_ignores_partial_head() {
        let mut branch = Branch::create(store()).unwrap();
        fill(&mut branch, 0..350);
        let before = branch.index().clone();
        let root = branch.cid();

        branch.compress().unwrap();
        assert_eq!(branch.index(), &before);
        assert_eq!(branch.cid(), root);
        assert_eq!(sizes(&branch), vec![50, 100, 100, 100]);
    }

    #[test]
    fn compress_on_empty_branch_is_a_no_op() {
        let mut branch = Branch::create(store()).unwrap();
        let root = branch.cid();
        branch.compress().unwrap();
        assert_eq!(branch.cid(), root);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug)]
    enum Op {
        Add,
        Edit(usize),
        Delete(usize),
        Compress,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            12 => Just(Op::Add),
            1 => any::<usize>().prop_map(Op::Edit),
            1 => any::<usize>().prop_map(Op::Delete),
            1 => Just(Op::Compress),
        ]
    }

    /// Key of the `pick`-th live entry, if any.
    fn live_key(model: &BTreeMap<Tid, Cid>, pick: usize) -> Option<Tid> {
        if model.is_empty() {
            return None;
        }
        model.keys().nth(pick % model.len()).copied()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_interleaved_ops_stay_unique_and_lossless(
            ops in proptest::collection::vec(op(), 1..900),
        ) {
            let mut branch = Branch::create(store()).unwrap();
            let mut model = BTreeMap::new();
            let mut next = 0u64;
            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Add => {
                        branch.add_entry(tid(next), rec(next)).unwrap();
                        model.insert(tid(next), rec(next));
                        next += 1;
                    }
                    Op::Edit(pick) => {
                        if let Some(key) = live_key(&model, pick) {
                            let cid = rec(step as u64 + 100_000);
                            branch.edit_entry(key, cid).unwrap();
                            model.insert(key, cid);
                        }
                    }
                    Op::Delete(pick) => {
                        if let Some(key) = live_key(&model, pick) {
                            prop_assert_eq!(branch.delete_entry(key).unwrap(), model[&key]);
                            model.remove(&key);
                        }
                    }
                    Op::Compress => branch.compress().unwrap(),
                }
                assert_unique_keys(&branch);
                prop_assert_eq!(&branch.entry_map().unwrap(), &model);
            }
        }
    }
}
