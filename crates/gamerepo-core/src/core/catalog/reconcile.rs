use gamerepo_domain::{CatalogDiff, CatalogSnapshot};
use tracing::debug;

use super::observer::CatalogObserver;
use super::scan::ScanDiagnostics;
use crate::store::{CacheError, CacheStore};

#[derive(Debug, Default)]
pub struct Reconciled {
    pub diff: CatalogDiff,
    /// The cache file was rewritten by this pass.
    pub persisted: bool,
    /// Directories the scan behind this pass skipped or could not update.
    pub diagnostics: ScanDiagnostics,
}

/// Diffs `scanned` against the store's current snapshot, notifies
/// `observer`, swaps the snapshot in and persists it when membership changed.
///
/// Records present in both snapshots keep their install state. Removal
/// notifications carry the evicted record and are all emitted before the new
/// snapshot replaces the old one.
///
/// # Errors
/// Returns an error if the cache file cannot be written. The in-memory
/// snapshot is already updated at that point and the write is retried by the
/// next pass.
pub fn apply_scan(
    store: &mut CacheStore,
    mut scanned: CatalogSnapshot,
    observer: &dyn CatalogObserver,
) -> Result<Reconciled, CacheError> {
    let diff = CatalogDiff::between(store.catalog(), &scanned);
    scanned.inherit_state(store.catalog());

    for record in &diff.added {
        observer.package_added(record);
    }
    for record in &diff.removed {
        observer.package_removed(record);
    }

    store.replace(scanned);
    if !diff.is_empty() {
        store.mark_pending();
    }
    if !store.has_pending_changes() {
        debug!("catalog unchanged");
        return Ok(Reconciled {
            diff,
            persisted: false,
            diagnostics: ScanDiagnostics::default(),
        });
    }
    store.persist()?;
    Ok(Reconciled {
        diff,
        persisted: true,
        diagnostics: ScanDiagnostics::default(),
    })
}
