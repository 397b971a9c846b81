use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use gamerepo_domain::PackageRecord;
use tracing::debug;

use super::process::{run_captured, RunOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The package declares no installer.
    NothingToInstall { id: String },
    /// The installer exited with code zero and the package is marked installed.
    Installed {
        id: String,
        output: RunOutput,
        /// The new state reached the cache file. When `false` the periodic
        /// install-state check writes it later.
        persisted: bool,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("unknown package {0}")]
    UnknownPackage(String),
    #[error("an install of {0} is already running")]
    InProgress(String),
    #[error("failed to start installer {}", .command.display())]
    Spawn {
        id: String,
        command: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("installer {} exited with code {}", .command.display(), .output.code)]
    Failed {
        id: String,
        command: PathBuf,
        output: RunOutput,
    },
}

impl InstallError {
    /// Captured installer output, when the installer ran at all.
    #[must_use]
    pub fn output(&self) -> Option<&RunOutput> {
        match self {
            Self::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Runs the installer declared by `record` and waits for it without a timeout.
///
/// Returns `Ok(None)` when there is nothing to install.
///
/// # Errors
/// Returns an error if the installer cannot be started or exits non-zero.
pub async fn run_installer(
    record: &PackageRecord,
    max_capture_bytes: usize,
) -> Result<Option<RunOutput>, InstallError> {
    let Some(command) = record.installer_command() else {
        return Ok(None);
    };
    debug!(id = %record.id, command = %command.display(), "running installer");
    let output = run_captured(&command, &record.location, max_capture_bytes)
        .await
        .map_err(|source| InstallError::Spawn {
            id: record.id.clone(),
            command: command.clone(),
            source,
        })?;
    debug!(id = %record.id, code = output.code, "installer exited");
    if !output.stdout.is_empty() {
        debug!(id = %record.id, "[stdout]\n{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        debug!(id = %record.id, "[stderr]\n{}", output.stderr);
    }
    if output.success() {
        Ok(Some(output))
    } else {
        Err(InstallError::Failed {
            id: record.id.clone(),
            command,
            output,
        })
    }
}

/// Package ids with an install in flight.
#[derive(Debug, Default, Clone)]
pub struct InstallSlots {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InstallSlots {
    /// Claims `id` until the returned guard drops; `None` if already claimed.
    #[must_use]
    pub fn claim(&self, id: &str) -> Option<InstallClaim> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(id.to_string()) {
            return None;
        }
        Some(InstallClaim {
            id: id.to_string(),
            active: Arc::clone(&self.active),
        })
    }
}

#[derive(Debug)]
pub struct InstallClaim {
    id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InstallClaim {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
