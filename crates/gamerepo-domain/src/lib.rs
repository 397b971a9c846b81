#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod catalog;
pub mod descriptor;
pub mod fs;
pub mod record;

pub use catalog::{CatalogDiff, CatalogSnapshot};
pub use descriptor::{
    descriptor_path, load_package, DescriptorError, LoadedPackage, DESCRIPTOR_FILE,
};
pub use fs::{render_json, write_json_atomic};
pub use record::{LocalState, OsCompatibility, PackageRecord};
