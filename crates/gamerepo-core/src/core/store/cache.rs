//! `local_repo.json` persistence.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gamerepo_domain::{write_json_atomic, CatalogSnapshot, PackageRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
#[error("failed to write catalog cache {}: {source}", .path.display())]
pub struct CacheError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Deserialize)]
struct StoredEntry {
    title: String,
    location: PathBuf,
    #[serde(default)]
    installer: Option<String>,
    #[serde(default)]
    image_files: Option<Vec<Option<String>>>,
    #[serde(default)]
    compatible_os: Option<Vec<String>>,
    #[serde(default)]
    installed: bool,
}

impl StoredEntry {
    fn into_record(self, id: String) -> PackageRecord {
        PackageRecord {
            id,
            title: self.title,
            location: self.location,
            installer_path: self.installer,
            image_paths: self.image_files.unwrap_or_default(),
            compatible_os: self.compatible_os.unwrap_or_default(),
            installed: self.installed,
            running: false,
        }
    }
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    title: &'a str,
    location: &'a Path,
    installer: Option<&'a str>,
    image_files: &'a [Option<String>],
    compatible_os: &'a [String],
    installed: bool,
}

impl<'a> From<&'a PackageRecord> for StoredEntryRef<'a> {
    fn from(record: &'a PackageRecord) -> Self {
        Self {
            title: &record.title,
            location: &record.location,
            installer: record.installer_path.as_deref(),
            image_files: &record.image_paths,
            compatible_os: &record.compatible_os,
            installed: record.installed,
        }
    }
}

/// The in-memory catalog and its durable mirror.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    catalog: CatalogSnapshot,
    persisted_installed: BTreeSet<String>,
    pending: bool,
}

impl CacheStore {
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            catalog: CatalogSnapshot::new(),
            persisted_installed: BTreeSet::new(),
            pending: false,
        }
    }

    /// Loads the snapshot persisted at `path`.
    ///
    /// A missing, empty or malformed file yields an empty catalog; malformed
    /// entries are dropped individually.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let catalog = read_catalog(&path);
        let persisted_installed = catalog.installed_ids();
        Self {
            path,
            catalog,
            persisted_installed,
            pending: false,
        }
    }

    /// Writes the whole catalog to the cache file.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be written; the previous file
    /// is left intact in that case.
    pub fn persist(&mut self) -> Result<(), CacheError> {
        let entries: BTreeMap<&str, StoredEntryRef<'_>> = self
            .catalog
            .records()
            .map(|record| (record.id.as_str(), StoredEntryRef::from(record)))
            .collect();
        write_json_atomic(&self.path, &entries).map_err(|source| CacheError {
            path: self.path.clone(),
            source,
        })?;
        self.persisted_installed = self.catalog.installed_ids();
        self.pending = false;
        debug!(
            path = %self.path.display(),
            packages = self.catalog.len(),
            "catalog cache written"
        );
        Ok(())
    }

    /// Swaps in `next` and hands back the snapshot it replaces.
    pub fn replace(&mut self, next: CatalogSnapshot) -> CatalogSnapshot {
        std::mem::replace(&mut self.catalog, next)
    }

    /// Returns `false` when `id` is not in the catalog.
    pub fn set_installed(&mut self, id: &str, installed: bool) -> bool {
        match self.catalog.get_mut(id) {
            Some(record) => {
                record.installed = installed;
                true
            }
            None => false,
        }
    }

    /// Records that the catalog changed in a way the cache file must reflect.
    pub fn mark_pending(&mut self) {
        self.pending = true;
    }

    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.pending
    }

    /// Install flags differ from what the cache file last recorded.
    #[must_use]
    pub fn install_state_dirty(&self) -> bool {
        self.catalog.installed_ids() != self.persisted_installed
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogSnapshot {
        &self.catalog
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PackageRecord> {
        self.catalog.get(id)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_catalog(path: &Path) -> CatalogSnapshot {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no catalog cache yet");
            return CatalogSnapshot::new();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "catalog cache unreadable; starting empty");
            return CatalogSnapshot::new();
        }
    };
    if contents.trim().is_empty() {
        return CatalogSnapshot::new();
    }
    let entries: Map<String, Value> = match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "catalog cache is malformed; starting empty");
            return CatalogSnapshot::new();
        }
    };

    let mut catalog = CatalogSnapshot::new();
    for (id, value) in entries {
        match serde_json::from_value::<StoredEntry>(value) {
            Ok(entry) => {
                let _ = catalog.insert(entry.into_record(id));
            }
            Err(err) => {
                warn!(path = %path.display(), %id, error = %err, "dropping malformed cache entry");
            }
        }
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, installed: bool) -> PackageRecord {
        let mut record = PackageRecord::new(id, format!("Game {id}"), format!("/repo/{id}"));
        record.installer_path = Some("setup.cmd".into());
        record.image_paths = vec![Some("cover.png".into()), None];
        record.compatible_os = vec!["windows".into(), "amiga".into()];
        record.installed = installed;
        record
    }

    fn store_with(path: &Path, records: &[PackageRecord]) -> CacheStore {
        let mut store = CacheStore::empty(path);
        store.replace(records.iter().cloned().collect());
        store
    }

    #[test]
    fn persisted_snapshot_loads_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        let mut store = store_with(&path, &[record("a", true), record("b", false)]);
        store.persist().expect("persist");

        let loaded = CacheStore::load(&path);
        assert_eq!(loaded.catalog(), store.catalog());
        assert!(!loaded.install_state_dirty());
    }

    #[test]
    fn cache_file_uses_documented_field_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        let mut store = store_with(&path, &[record("a", false)]);
        store.persist().expect("persist");

        let value: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(
            value,
            json!({
                "a": {
                    "title": "Game a",
                    "location": "/repo/a",
                    "installer": "setup.cmd",
                    "image_files": ["cover.png", null],
                    "compatible_os": ["windows", "amiga"],
                    "installed": false
                }
            })
        );
    }

    #[test]
    fn empty_catalog_persists_as_empty_object() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        CacheStore::empty(&path).persist().expect("persist");
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "{}");
    }

    #[test]
    fn missing_empty_and_malformed_files_load_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        assert!(CacheStore::load(&path).catalog().is_empty());

        fs::write(&path, "").expect("write");
        assert!(CacheStore::load(&path).catalog().is_empty());

        fs::write(&path, "{\"a\": {\"title\": ").expect("write");
        assert!(CacheStore::load(&path).catalog().is_empty());

        fs::write(&path, "[1, 2, 3]").expect("write");
        assert!(CacheStore::load(&path).catalog().is_empty());
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        fs::write(
            &path,
            r#"{
                "good": {"title": "Good", "location": "/repo/good", "installer": null,
                         "image_files": [], "compatible_os": null, "installed": true},
                "bad": {"location": "/repo/bad"}
            }"#,
        )
        .expect("write");

        let store = CacheStore::load(&path);
        assert_eq!(store.catalog().len(), 1);
        let good = store.get("good").expect("good entry");
        assert!(good.installed);
        assert!(good.compatible_os.is_empty());
    }

    #[test]
    fn interrupted_write_leaves_previous_snapshot_readable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        let mut store = store_with(&path, &[record("a", false)]);
        store.persist().expect("persist");

        // A crash between temp write and rename leaves only a partial sibling.
        fs::write(temp.path().join(".gamerepo-crash.tmp"), "{\"a\": {\"tit").expect("partial");
        let loaded = CacheStore::load(&path);
        assert_eq!(loaded.catalog().ids().collect::<Vec<_>>(), ["a"]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_persist_keeps_previous_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("state");
        fs::create_dir_all(&dir).expect("state dir");
        let path = dir.join("local_repo.json");
        let mut store = store_with(&path, &[record("a", false)]);
        store.persist().expect("persist");
        let before = fs::read_to_string(&path).expect("read");

        store.set_installed("a", true);
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).expect("chmod");
        let result = store.persist();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).expect("restore");

        // Privileged runners can write regardless of mode bits.
        if let Err(err) = result {
            assert_eq!(err.path, path);
            assert!(err.to_string().contains(&err.source.to_string()));
            assert_eq!(fs::read_to_string(&path).expect("read"), before);
            assert!(store.install_state_dirty());
            let leftovers: Vec<_> = fs::read_dir(&dir)
                .expect("list")
                .map(|entry| entry.expect("entry").file_name())
                .collect();
            assert_eq!(leftovers, ["local_repo.json"]);
        }
    }

    #[test]
    fn install_flips_mark_state_dirty_until_persisted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("local_repo.json");
        let mut store = store_with(&path, &[record("a", false)]);
        store.persist().expect("persist");
        assert!(!store.install_state_dirty());

        assert!(store.set_installed("a", true));
        assert!(!store.set_installed("missing", true));
        assert!(store.install_state_dirty());
        store.persist().expect("persist");
        assert!(!store.install_state_dirty());
    }
}
