use std::sync::Arc;

use gamerepo_domain::{LocalState, OsCompatibility, PackageRecord};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{
    apply_scan, scan_repository, CatalogObserver, Reconciled, RootUnreadable, ScanDiagnostics,
    ScanReport,
};
use crate::config::Config;
use crate::install::{run_installer, InstallError, InstallOutcome, InstallSlots};
use crate::schedule::TaskGuard;
use crate::store::{CacheError, CacheStore};

/// Install state reported to the host for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalPackage {
    pub id: String,
    #[serde(serialize_with = "serialize_state")]
    pub state: LocalState,
}

fn serialize_state<S: serde::Serializer>(state: &LocalState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(state.bits())
}

/// A scan-driven pass that left the catalog and the cache file untouched.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    RootUnreadable(#[from] RootUnreadable),
    #[error("repository scan did not complete: {0}")]
    ScanAborted(#[source] tokio::task::JoinError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result of the initial sync.
#[derive(Debug)]
pub struct OwnedPackages {
    pub packages: Vec<PackageRecord>,
    pub diagnostics: ScanDiagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRun {
    Completed,
    /// The previous run of the task was still active.
    Skipped,
}

/// Everything one repository needs at runtime, shared through an `Arc`.
pub struct RepoContext {
    config: Config,
    store: Mutex<CacheStore>,
    /// Held from scan start until its result is applied, so an older scan
    /// never lands on top of a newer one.
    scan_lock: Mutex<()>,
    catalog_task: TaskGuard,
    install_state_task: TaskGuard,
    installs: InstallSlots,
    observer: Arc<dyn CatalogObserver>,
}

impl std::fmt::Debug for RepoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoContext")
            .field("config", &self.config)
            .field("catalog_task", &self.catalog_task)
            .field("install_state_task", &self.install_state_task)
            .finish_non_exhaustive()
    }
}

impl RepoContext {
    /// Loads the cache file named by `config`; a missing or malformed cache
    /// starts an empty catalog.
    #[must_use]
    pub fn open(config: Config, observer: Arc<dyn CatalogObserver>) -> Self {
        let store = CacheStore::load(config.cache_file());
        debug!(
            root = %config.repo_root().display(),
            cache = %config.cache_file().display(),
            packages = store.catalog().len(),
            "repository context opened"
        );
        Self {
            config,
            store: Mutex::new(store),
            scan_lock: Mutex::new(()),
            catalog_task: TaskGuard::new("catalog"),
            install_state_task: TaskGuard::new("install-state"),
            installs: InstallSlots::default(),
            observer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Records currently in the catalog, ordered by id.
    pub async fn packages(&self) -> Vec<PackageRecord> {
        self.store.lock().await.catalog().records().cloned().collect()
    }

    /// One reconciliation pass: scan, diff, notify, persist on change.
    ///
    /// # Errors
    /// Returns an error if the root cannot be listed, in which case nothing
    /// changes, or if the cache file cannot be written.
    pub async fn reconcile(&self) -> Result<Reconciled, SyncError> {
        let _scanning = self.scan_lock.lock().await;
        let report = self.scan().await?;
        let mut store = self.store.lock().await;
        let mut reconciled = apply_scan(&mut store, report.snapshot, self.observer.as_ref())?;
        reconciled.diagnostics = report.diagnostics;
        Ok(reconciled)
    }

    /// Initial sync for the host: scans, merges the result into the catalog
    /// and always persists. The returned list is the host's view, so no
    /// observer notifications are emitted.
    ///
    /// # Errors
    /// Returns an error if the root cannot be listed, in which case nothing
    /// changes, or if the cache file cannot be written.
    pub async fn owned_packages(&self) -> Result<OwnedPackages, SyncError> {
        let _scanning = self.scan_lock.lock().await;
        let report = self.scan().await?;
        let mut scanned = report.snapshot;
        let mut store = self.store.lock().await;
        scanned.inherit_state(store.catalog());
        store.replace(scanned);
        store.persist()?;
        Ok(OwnedPackages {
            packages: store.catalog().records().cloned().collect(),
            diagnostics: report.diagnostics,
        })
    }

    pub async fn local_packages(&self) -> Vec<LocalPackage> {
        self.store
            .lock()
            .await
            .catalog()
            .records()
            .map(|record| LocalPackage {
                id: record.id.clone(),
                state: record.local_state(),
            })
            .collect()
    }

    /// `None` for unknown ids and for packages without known OS tags.
    pub async fn os_compatibility(&self, id: &str) -> Option<OsCompatibility> {
        self.store
            .lock()
            .await
            .get(id)
            .and_then(PackageRecord::os_compatibility)
    }

    /// Runs the package's installer and marks it installed on success.
    ///
    /// The store lock is released while the installer runs.
    ///
    /// # Errors
    /// Returns an error for unknown ids, for an install of the same id that
    /// is still running, and when the installer fails to start or exits
    /// non-zero.
    pub async fn install(&self, id: &str) -> Result<InstallOutcome, InstallError> {
        let Some(_claim) = self.installs.claim(id) else {
            return Err(InstallError::InProgress(id.to_string()));
        };
        let record = self
            .store
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| InstallError::UnknownPackage(id.to_string()))?;

        let output = match run_installer(&record, self.config.install().max_capture_bytes).await {
            Ok(Some(output)) => output,
            Ok(None) => {
                info!(id, "package has no installer");
                return Ok(InstallOutcome::NothingToInstall { id: id.to_string() });
            }
            Err(err) => {
                warn!(id, error = %err, "install failed");
                if let Some(output) = err.output() {
                    warn!(id, stdout = %output.stdout, stderr = %output.stderr, "installer output");
                }
                return Err(err);
            }
        };

        let mut store = self.store.lock().await;
        let persisted = if store.set_installed(id, true) {
            match store.persist() {
                Ok(()) => true,
                Err(err) => {
                    warn!(id, error = %err, "install state not persisted; retrying on next tick");
                    false
                }
            }
        } else {
            warn!(id, "package left the catalog during install");
            false
        };
        info!(id, title = %record.title, "package installed");
        Ok(InstallOutcome::Installed {
            id: id.to_string(),
            output,
            persisted,
        })
    }

    /// Persists install flips the cache file does not reflect yet.
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    /// Returns an error if the cache file cannot be written.
    pub async fn check_install_state(&self) -> Result<bool, CacheError> {
        let mut store = self.store.lock().await;
        if !store.install_state_dirty() {
            return Ok(false);
        }
        store.persist()?;
        debug!("install state persisted");
        Ok(true)
    }

    /// Periodic catalog reconciliation, including the cool-down.
    pub async fn catalog_task(&self) -> TaskRun {
        let Some(_ticket) = self.catalog_task.try_start() else {
            debug!(task = self.catalog_task.name(), "previous run still active; tick dropped");
            return TaskRun::Skipped;
        };
        debug!("checking for changes in the repository");
        match self.reconcile().await {
            Ok(reconciled) if !reconciled.diff.is_empty() => info!(
                added = reconciled.diff.added.len(),
                removed = reconciled.diff.removed.len(),
                "catalog reconciled"
            ),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "catalog reconciliation failed; retrying on next tick"),
        }
        tokio::time::sleep(self.config.schedule().cooldown).await;
        TaskRun::Completed
    }

    /// Periodic install-state verification, including the cool-down.
    pub async fn install_state_task(&self) -> TaskRun {
        let Some(_ticket) = self.install_state_task.try_start() else {
            debug!(task = self.install_state_task.name(), "previous run still active; tick dropped");
            return TaskRun::Skipped;
        };
        if let Err(err) = self.check_install_state().await {
            warn!(error = %err, "install state check failed; retrying on next tick");
        }
        tokio::time::sleep(self.config.schedule().cooldown).await;
        TaskRun::Completed
    }

    /// Fires both periodic tasks without waiting for them.
    pub fn tick(self: &Arc<Self>) -> (JoinHandle<TaskRun>, JoinHandle<TaskRun>) {
        let catalog = Arc::clone(self);
        let install_state = Arc::clone(self);
        (
            tokio::spawn(async move { catalog.catalog_task().await }),
            tokio::spawn(async move { install_state.install_state_task().await }),
        )
    }

    async fn scan(&self) -> Result<ScanReport, SyncError> {
        let root = self.config.repo_root().to_path_buf();
        let report = tokio::task::spawn_blocking(move || scan_repository(&root))
            .await
            .map_err(SyncError::ScanAborted)??;
        Ok(report)
    }
}
