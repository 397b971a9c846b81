use gamerepo_domain::PackageRecord;
use tracing::info;

/// Receives catalog membership changes. Calls are fire-and-forget.
pub trait CatalogObserver: Send + Sync {
    fn package_added(&self, record: &PackageRecord);
    /// `record` is a copy of the last-known state; the package is evicted
    /// from the catalog after every observer has been told.
    fn package_removed(&self, record: &PackageRecord);
}

/// Observer that only logs events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl CatalogObserver for LogObserver {
    fn package_added(&self, record: &PackageRecord) {
        info!(id = %record.id, title = %record.title, "package is new, adding to catalog");
    }

    fn package_removed(&self, record: &PackageRecord) {
        info!(id = %record.id, title = %record.title, "package disappeared, removing from catalog");
    }
}
