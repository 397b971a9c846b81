//! Catalog scanning and reconciliation against the cached snapshot.

pub mod observer;
pub mod reconcile;
pub mod scan;

pub use observer::{CatalogObserver, LogObserver};
pub use reconcile::{apply_scan, Reconciled};
pub use scan::{
    scan_repository, RootUnreadable, ScanDiagnostics, ScanError, ScanFailure, ScanReport,
};
