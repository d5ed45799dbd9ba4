//! Structural comparison of two versions of a keyed map or branch.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tidal_repo::{Branch, RepoResult};
use tidal_types::{Cid, Tid};

/// One difference between an old and a new version of a map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change<K, V> {
    Added { key: K, new: V },
    Updated { key: K, old: V, new: V },
    Deleted { key: K, old: V },
}

impl<K, V> Change<K, V> {
    pub fn key(&self) -> &K {
        match self {
            Self::Added { key, .. } | Self::Updated { key, .. } | Self::Deleted { key, .. } => key,
        }
    }
}

/// Every difference between `old` and `new`, ascending by key.
pub fn diff_maps<K, V>(old: &BTreeMap<K, V>, new: &BTreeMap<K, V>) -> Vec<Change<K, V>>
where
    K: Ord + Clone,
    V: PartialEq + Clone,
{
    let mut changes = Vec::new();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        let order = match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((ok, _)), Some((nk, _))) => ok.cmp(nk),
        };
        match order {
            Ordering::Less => {
                if let Some((key, old)) = old_iter.next() {
                    changes.push(Change::Deleted {
                        key: key.clone(),
                        old: old.clone(),
                    });
                }
            }
            Ordering::Greater => {
                if let Some((key, new)) = new_iter.next() {
                    changes.push(Change::Added {
                        key: key.clone(),
                        new: new.clone(),
                    });
                }
            }
            Ordering::Equal => {
                if let (Some((key, old)), Some((_, new))) = (old_iter.next(), new_iter.next()) {
                    if old != new {
                        changes.push(Change::Updated {
                            key: key.clone(),
                            old: old.clone(),
                            new: new.clone(),
                        });
                    }
                }
            }
        }
    }

    changes
}

/// Entry changes between two versions of a branch, ascending by key.
///
/// Tables present under the same CID in both versions hold identical
/// entries and are not read.
pub fn branch_delta(old: &Branch, new: &Branch) -> RepoResult<Vec<Change<Tid, Cid>>> {
    if old.cid() == new.cid() {
        return Ok(Vec::new());
    }
    let old_entries = unshared_entries(old, new)?;
    let new_entries = unshared_entries(new, old)?;
    Ok(diff_maps(&old_entries, &new_entries))
}

fn unshared_entries(branch: &Branch, other: &Branch) -> RepoResult<BTreeMap<Tid, Cid>> {
    let shared: HashSet<Cid> = other.index().values().copied().collect();
    let mut entries = BTreeMap::new();
    for (name, cid) in branch.index() {
        if shared.contains(cid) {
            continue;
        }
        if let Some(table) = branch.get_table(name)? {
            entries.extend(table.data().iter().map(|(t, c)| (*t, *c)));
        }
    }
    Ok(entries)
}
