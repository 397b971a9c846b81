use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gamerepo_domain::{load_package, CatalogSnapshot, DescriptorError};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("identifier {id} is already used by {}", .first.display())]
    DuplicateId { id: String, first: PathBuf },
}

/// The repository root exists but could not be listed. No snapshot is
/// produced, so callers must leave the catalog untouched.
#[derive(Debug, thiserror::Error)]
#[error("failed to list repository root {}: {source}", .root.display())]
pub struct RootUnreadable {
    pub root: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A directory that was left out of the snapshot.
#[derive(Debug)]
pub struct ScanFailure {
    pub directory: PathBuf,
    pub error: ScanError,
}

/// Per-directory problems found by one scan.
#[derive(Debug, Default)]
pub struct ScanDiagnostics {
    pub rejected: Vec<ScanFailure>,
    /// Identifier write-backs that failed; the records are still cataloged.
    pub warnings: Vec<DescriptorError>,
}

impl ScanDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty() && self.warnings.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub snapshot: CatalogSnapshot,
    pub diagnostics: ScanDiagnostics,
    /// Packages that received a new identifier during this scan.
    pub assigned: usize,
}

/// Scans the immediate subdirectories of `root` for packages.
///
/// A root that does not exist yet scans as empty. Directories are visited in
/// name order, so when two descriptors share an identifier the first
/// directory keeps it.
///
/// # Errors
/// Returns an error when the root exists but cannot be listed completely.
pub fn scan_repository(root: &Path) -> Result<ScanReport, RootUnreadable> {
    let mut report = ScanReport::default();
    let unreadable = |source| RootUnreadable {
        root: root.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(root = %root.display(), "repository root does not exist yet");
            return Ok(report);
        }
        Err(err) => return Err(unreadable(err)),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let path = entry.map_err(unreadable)?.path();
        if path.is_dir() {
            candidates.push(path);
        }
    }
    candidates.sort();

    for dir in candidates {
        let loaded = match load_package(&dir) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => continue,
            Err(err) => {
                warn!(directory = %dir.display(), error = %err, "skipping package directory");
                report.diagnostics.rejected.push(ScanFailure {
                    directory: dir,
                    error: err.into(),
                });
                continue;
            }
        };
        if let Some(err) = loaded.write_error {
            warn!(directory = %dir.display(), error = %err, "package identifier not persisted");
            report.diagnostics.warnings.push(err);
        }
        if loaded.assigned_id {
            report.assigned += 1;
        }
        debug!(id = %loaded.record.id, title = %loaded.record.title, "found package");
        if let Err(duplicate) = report.snapshot.insert(loaded.record) {
            let first = report
                .snapshot
                .get(&duplicate.id)
                .map(|record| record.location.clone())
                .unwrap_or_default();
            let error = ScanError::DuplicateId {
                id: duplicate.id,
                first,
            };
            warn!(directory = %dir.display(), error = %error, "skipping package directory");
            report.diagnostics.rejected.push(ScanFailure {
                directory: dir,
                error,
            });
        }
    }
    Ok(report)
}
