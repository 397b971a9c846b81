//! Per-package `game.json` descriptors.
//!
//! A descriptor is the only metadata a package directory carries. Reading one
//! validates the title and back-fills a generated `uuid` so the directory keeps
//! the same identity across scans and restarts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::fs::write_json_atomic;
use crate::record::PackageRecord;

pub const DESCRIPTOR_FILE: &str = "game.json";

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },
    #[error("{} has no title", .path.display())]
    MissingTitle { path: PathBuf },
    #[error("failed to write identifier {id} back to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        id: String,
        #[source]
        source: io::Error,
    },
}

impl DescriptorError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::NotAnObject { path }
            | Self::MissingTitle { path }
            | Self::Write { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DescriptorFields {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    installer_file: Option<String>,
    #[serde(default)]
    image_files: Option<Vec<Option<String>>>,
    #[serde(default)]
    compatible_os: Option<Vec<String>>,
}

/// A package read from its directory.
#[derive(Debug)]
pub struct LoadedPackage {
    pub record: PackageRecord,
    /// The identifier was generated during this read.
    pub assigned_id: bool,
    /// Set when the generated identifier could not be written back. The
    /// record still carries the generated id for this run.
    pub write_error: Option<DescriptorError>,
}

#[must_use]
pub fn descriptor_path(dir: &Path) -> PathBuf {
    dir.join(DESCRIPTOR_FILE)
}

/// Reads the package in `dir`.
///
/// Returns `Ok(None)` when the directory has no descriptor and is therefore
/// not a package.
pub fn load_package(dir: &Path) -> Result<Option<LoadedPackage>, DescriptorError> {
    let path = descriptor_path(dir);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(DescriptorError::Read { path, source }),
    };
    let raw: Value = serde_json::from_str(&contents).map_err(|source| DescriptorError::Parse {
        path: path.clone(),
        source,
    })?;
    let Value::Object(mut object) = raw else {
        return Err(DescriptorError::NotAnObject { path });
    };
    let fields: DescriptorFields = serde_json::from_value(Value::Object(object.clone()))
        .map_err(|source| DescriptorError::Parse {
            path: path.clone(),
            source,
        })?;

    let title = fields
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| DescriptorError::MissingTitle { path: path.clone() })?;

    let existing_id = fields.uuid.filter(|id| !id.trim().is_empty());
    let assigned_id = existing_id.is_none();
    let mut write_error = None;
    let id = match existing_id {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            debug!(descriptor = %path.display(), %id, "assigning package identifier");
            if let Err(err) = write_back_id(&path, &mut object, &id) {
                write_error = Some(err);
            }
            id
        }
    };

    let location = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let record = PackageRecord {
        id,
        title,
        location,
        installer_path: fields.installer_file,
        image_paths: fields.image_files.unwrap_or_default(),
        compatible_os: fields.compatible_os.unwrap_or_default(),
        installed: false,
        running: false,
    };
    Ok(Some(LoadedPackage {
        record,
        assigned_id,
        write_error,
    }))
}

fn write_back_id(
    path: &Path,
    object: &mut Map<String, Value>,
    id: &str,
) -> Result<(), DescriptorError> {
    object.insert("uuid".to_string(), Value::String(id.to_string()));
    write_json_atomic(path, object).map_err(|source| DescriptorError::Write {
        path: path.to_path_buf(),
        id: id.to_string(),
        source,
    })
}
