use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

use crate::record::PackageRecord;

/// Identifier to record mapping at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    records: BTreeMap<String, PackageRecord>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, refusing to overwrite an existing id.
    ///
    /// Returns the record back when its id is already taken.
    pub fn insert(&mut self, record: PackageRecord) -> Result<(), PackageRecord> {
        match self.records.entry(record.id.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
            btree_map::Entry::Occupied(_) => Err(record),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PackageRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PackageRecord> {
        self.records.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    /// Ids of records currently marked installed.
    #[must_use]
    pub fn installed_ids(&self) -> BTreeSet<String> {
        self.records
            .values()
            .filter(|record| record.installed)
            .map(|record| record.id.clone())
            .collect()
    }

    /// Copies install and running state from `previous` for every id both
    /// snapshots share. Descriptors carry no install state, so a fresh scan
    /// would otherwise forget it.
    pub fn inherit_state(&mut self, previous: &CatalogSnapshot) {
        for (id, record) in &mut self.records {
            if let Some(prior) = previous.records.get(id) {
                record.installed = prior.installed;
                record.running = prior.running;
            }
        }
    }
}

impl FromIterator<PackageRecord> for CatalogSnapshot {
    /// Later records with an id already present are dropped.
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            let _ = snapshot.insert(record);
        }
        snapshot
    }
}

/// Membership changes between two snapshots, compared by id only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    /// Records present in the current snapshot but not the previous one.
    pub added: Vec<PackageRecord>,
    /// Last-known copies of records present only in the previous snapshot.
    pub removed: Vec<PackageRecord>,
}

impl CatalogDiff {
    #[must_use]
    pub fn between(previous: &CatalogSnapshot, current: &CatalogSnapshot) -> Self {
        let added = current
            .records
            .iter()
            .filter(|(id, _)| !previous.records.contains_key(*id))
            .map(|(_, record)| record.clone())
            .collect();
        let removed = previous
            .records
            .iter()
            .filter(|(id, _)| !current.records.contains_key(*id))
            .map(|(_, record)| record.clone())
            .collect();
        Self { added, removed }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PackageRecord {
        PackageRecord::new(id, format!("Title {id}"), format!("/repo/{id}"))
    }

    fn snapshot(ids: &[&str]) -> CatalogSnapshot {
        ids.iter().copied().map(record).collect()
    }

    #[test]
    fn diff_reports_added_and_removed_by_id() {
        let previous = snapshot(&["a", "b", "c"]);
        let current = snapshot(&["b", "c", "d", "e"]);
        let diff = CatalogDiff::between(&previous, &current);

        let added: Vec<_> = diff.added.iter().map(|r| r.id.as_str()).collect();
        let removed: Vec<_> = diff.removed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(added, ["d", "e"]);
        assert_eq!(removed, ["a"]);
        for id in &added {
            assert!(current.contains(id) && !previous.contains(id));
            assert!(!removed.contains(id));
        }
        for id in &removed {
            assert!(previous.contains(id) && !current.contains(id));
        }
    }

    #[test]
    fn metadata_edits_are_not_membership_changes() {
        let previous = snapshot(&["a"]);
        let mut current = snapshot(&["a"]);
        current.get_mut("a").expect("a").title = "Renamed".into();
        assert!(CatalogDiff::between(&previous, &current).is_empty());
    }

    #[test]
    fn removed_records_are_copies_of_previous_state() {
        let mut previous = snapshot(&["gone"]);
        previous.get_mut("gone").expect("gone").installed = true;
        let diff = CatalogDiff::between(&previous, &CatalogSnapshot::new());
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.removed[0].installed);
        assert!(previous.contains("gone"));
    }

    #[test]
    fn insert_refuses_duplicate_ids() {
        let mut catalog = CatalogSnapshot::new();
        catalog.insert(record("a")).expect("first insert");
        let mut dup = record("a");
        dup.title = "Other".into();
        let rejected = catalog.insert(dup).expect_err("duplicate");
        assert_eq!(rejected.title, "Other");
        assert_eq!(catalog.get("a").expect("a").title, "Title a");
    }

    #[test]
    fn inherit_state_copies_flags_for_shared_ids() {
        let mut previous = snapshot(&["a", "b"]);
        previous.get_mut("a").expect("a").installed = true;
        previous.get_mut("b").expect("b").running = true;
        let mut current = snapshot(&["a", "c"]);
        current.inherit_state(&previous);
        assert!(current.get("a").expect("a").installed);
        assert!(!current.get("c").expect("c").installed);
        assert_eq!(current.installed_ids().into_iter().collect::<Vec<_>>(), ["a"]);
    }
}
