use std::path::PathBuf;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Operating systems a package declares support for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OsCompatibility: u32 {
        const WINDOWS = 0b001;
        const MAC = 0b010;
        const LINUX = 0b100;
    }
}

impl OsCompatibility {
    /// Maps a descriptor tag to its flag. Unknown tags map to nothing.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "windows" => Some(Self::WINDOWS),
            "mac" => Some(Self::MAC),
            "linux" => Some(Self::LINUX),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        tags.into_iter()
            .filter_map(Self::from_tag)
            .fold(Self::empty(), |mask, flag| mask | flag)
    }
}

bitflags::bitflags! {
    /// Local state reported to the launcher for a package.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LocalState: u32 {
        const INSTALLED = 0b01;
        const RUNNING = 0b10;
    }
}

/// One package directory with a valid descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub title: String,
    pub location: PathBuf,
    pub installer_path: Option<String>,
    pub image_paths: Vec<Option<String>>,
    pub compatible_os: Vec<String>,
    pub installed: bool,
    pub running: bool,
}

impl PackageRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            location: location.into(),
            installer_path: None,
            image_paths: Vec::new(),
            compatible_os: Vec::new(),
            installed: false,
            running: false,
        }
    }

    /// Installer path relative to `location`, if one is declared and non-empty.
    #[must_use]
    pub fn installer(&self) -> Option<&str> {
        self.installer_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    /// Absolute path of the installer inside the package directory.
    #[must_use]
    pub fn installer_command(&self) -> Option<PathBuf> {
        self.installer().map(|installer| self.location.join(installer))
    }

    #[must_use]
    pub fn local_state(&self) -> LocalState {
        let mut state = LocalState::empty();
        if self.installed {
            state |= LocalState::INSTALLED;
        }
        if self.running {
            state |= LocalState::RUNNING;
        }
        state
    }

    /// Compatibility mask, or `None` when no known OS tag is declared.
    #[must_use]
    pub fn os_compatibility(&self) -> Option<OsCompatibility> {
        let mask = OsCompatibility::from_tags(self.compatible_os.iter().map(String::as_str));
        (!mask.is_empty()).then_some(mask)
    }
}
