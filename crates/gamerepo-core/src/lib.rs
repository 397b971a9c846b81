#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

mod core;

pub(crate) use crate::core::config::context;
pub(crate) use crate::core::runtime::{install, schedule};
pub(crate) use crate::core::{catalog, config, store};

pub use crate::core::catalog::{
    apply_scan, scan_repository, CatalogObserver, LogObserver, Reconciled, RootUnreadable,
    ScanDiagnostics, ScanError, ScanFailure, ScanReport,
};
pub use crate::core::config::context::{
    LocalPackage, OwnedPackages, RepoContext, SyncError, TaskRun,
};
pub use crate::core::config::{Config, ConfigError, InstallConfig, ScheduleConfig, CACHE_FILE};
pub use crate::core::runtime::{
    run_periodic, InstallError, InstallOutcome, RunOutput, TaskGuard, TaskTicket,
};
pub use crate::core::store::{CacheError, CacheStore};
pub use crate::core::tooling::outcome::{
    format_status_message, to_json_response, CommandStatus, ExecutionOutcome,
};
