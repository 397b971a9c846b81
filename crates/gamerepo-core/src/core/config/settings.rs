use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CACHE_FILE: &str = "local_repo.json";

const DEFAULT_TICK: Duration = Duration::from_millis(1000);
const DEFAULT_COOLDOWN: Duration = Duration::from_millis(5000);
const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("repository root is not configured (set GAMEREPO_ROOT or pass --root)")]
    MissingRoot,
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn number(&self, key: &'static str) -> Result<Option<u64>, ConfigError> {
        self.var(key)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber {
                        key,
                        value: raw.to_string(),
                    })
            })
            .transpose()
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) repo_root: PathBuf,
    pub(crate) cache_file: PathBuf,
    pub(crate) schedule: ScheduleConfig,
    pub(crate) install: InstallConfig,
}

impl Config {
    /// Configuration for `repo_root` with every other setting at its default.
    #[must_use]
    pub fn for_root(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            cache_file: repo_root.join(CACHE_FILE),
            repo_root,
            schedule: ScheduleConfig::default(),
            install: InstallConfig::default(),
        }
    }

    /// Builds a configuration from the process environment. `root_override`
    /// takes precedence over `GAMEREPO_ROOT`.
    ///
    /// # Errors
    /// Returns an error if no root is configured or a numeric setting is invalid.
    pub fn from_env(root_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_snapshot(&EnvSnapshot::capture(), root_override)
    }

    pub(crate) fn from_snapshot(
        snapshot: &EnvSnapshot,
        root_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let repo_root = root_override
            .or_else(|| snapshot.var("GAMEREPO_ROOT").map(PathBuf::from))
            .ok_or(ConfigError::MissingRoot)?;
        let mut config = Self::for_root(repo_root);
        if let Some(cache_file) = snapshot.var("GAMEREPO_CACHE_FILE") {
            config.cache_file = PathBuf::from(cache_file);
        }
        if let Some(ms) = snapshot.number("GAMEREPO_TICK_MS")? {
            config.schedule.tick = Duration::from_millis(ms);
        }
        if let Some(ms) = snapshot.number("GAMEREPO_COOLDOWN_MS")? {
            config.schedule.cooldown = Duration::from_millis(ms);
        }
        if let Some(bytes) = snapshot.number("GAMEREPO_MAX_CAPTURE_BYTES")? {
            config.install.max_capture_bytes = usize::try_from(bytes)
                .ok()
                .filter(|bytes| *bytes > 0)
                .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    #[must_use]
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    #[must_use]
    pub fn schedule(&self) -> ScheduleConfig {
        self.schedule
    }

    #[must_use]
    pub fn install(&self) -> InstallConfig {
        self.install
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Interval between periodic ticks.
    pub tick: Duration,
    /// Delay awaited at the end of each periodic task body before its guard
    /// accepts a new run.
    pub cooldown: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallConfig {
    /// Per-stream limit for captured installer output.
    pub max_capture_bytes: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_required() {
        let snapshot = EnvSnapshot::testing(&[]);
        assert_eq!(
            Config::from_snapshot(&snapshot, None).unwrap_err(),
            ConfigError::MissingRoot
        );
        let snapshot = EnvSnapshot::testing(&[("GAMEREPO_ROOT", "  ")]);
        assert!(Config::from_snapshot(&snapshot, None).is_err());
    }

    #[test]
    fn defaults_follow_the_root() {
        let snapshot = EnvSnapshot::testing(&[("GAMEREPO_ROOT", "/games")]);
        let config = Config::from_snapshot(&snapshot, None).unwrap();
        assert_eq!(config.repo_root(), Path::new("/games"));
        assert_eq!(config.cache_file(), Path::new("/games/local_repo.json"));
        assert_eq!(config.schedule(), ScheduleConfig::default());
        assert_eq!(config.install().max_capture_bytes, DEFAULT_MAX_CAPTURE_BYTES);
    }

    #[test]
    fn override_wins_over_environment() {
        let snapshot = EnvSnapshot::testing(&[
            ("GAMEREPO_ROOT", "/games"),
            ("GAMEREPO_CACHE_FILE", "/var/cache/repo.json"),
            ("GAMEREPO_TICK_MS", "250"),
            ("GAMEREPO_COOLDOWN_MS", "0"),
        ]);
        let config = Config::from_snapshot(&snapshot, Some(PathBuf::from("/other"))).unwrap();
        assert_eq!(config.repo_root(), Path::new("/other"));
        assert_eq!(config.cache_file(), Path::new("/var/cache/repo.json"));
        assert_eq!(config.schedule().tick, Duration::from_millis(250));
        assert_eq!(config.schedule().cooldown, Duration::ZERO);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let snapshot = EnvSnapshot::testing(&[
            ("GAMEREPO_ROOT", "/games"),
            ("GAMEREPO_TICK_MS", "soon"),
        ]);
        let err = Config::from_snapshot(&snapshot, None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "GAMEREPO_TICK_MS",
                ..
            }
        ));
    }

    #[test]
    fn zero_capture_limit_falls_back_to_default() {
        let snapshot = EnvSnapshot::testing(&[
            ("GAMEREPO_ROOT", "/games"),
            ("GAMEREPO_MAX_CAPTURE_BYTES", "0"),
        ]);
        let config = Config::from_snapshot(&snapshot, None).unwrap();
        assert_eq!(config.install().max_capture_bytes, DEFAULT_MAX_CAPTURE_BYTES);
    }
}
