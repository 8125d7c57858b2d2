//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SyncError};
use crate::logger::line::LogFormat;
use crate::sync::checksum::CompareMode;

/// Full syncer configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
    /// File the config was loaded from (if any). Never serialized.
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

/// Mirroring behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds to sleep between tick completions.
    pub interval_secs: f64,
    /// How file content equality is decided.
    pub compare: CompareMode,
    /// Dereference symlinks found in the source tree instead of skipping them.
    pub follow_symlinks: bool,
    /// Log planned operations without touching the replica.
    pub dry_run: bool,
}

/// Log file and console output tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Mirror log lines to stdout.
    pub console: bool,
    /// Emit DEBUG lines on the console.
    pub verbose: bool,
    /// Rotate the log file once it grows past this size. 0 disables rotation.
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60.0,
            compare: CompareMode::Checksum,
            follow_symlinks: false,
            dry_run: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            console: true,
            verbose: false,
            max_size_bytes: 100 * 1024 * 1024, // 100 MiB
            max_rotated_files: 5,
            fsync_interval_secs: 10,
        }
    }
}

impl Config {
    /// Default configuration path: `$HOME/.config/fsyncer/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home.join(".config").join("fsyncer").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    /// The result is not validated: callers apply their own overrides first, then call
    /// [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SyncError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let mut parsed: Self = toml::from_str(&raw)?;
            parsed.config_file = Some(path_buf);
            parsed
        } else if is_explicit_path {
            return Err(SyncError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the startup log line.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Check invariants that must hold before the scheduler starts.
    pub fn validate(&self) -> Result<()> {
        let interval = self.sync.interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(SyncError::InvalidInterval {
                raw: interval.to_string(),
                reason: "interval must be a positive number of seconds".to_string(),
            });
        }

        if self.logging.max_size_bytes > 0 && self.logging.max_rotated_files == 0 {
            return Err(SyncError::InvalidConfig {
                details: "logging.max_rotated_files must be >= 1 when rotation is enabled"
                    .to_string(),
            });
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(env_var)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FSYNCER_SYNC_INTERVAL_SECS") {
            self.sync.interval_secs = parse_env("FSYNCER_SYNC_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("FSYNCER_SYNC_COMPARE") {
            self.sync.compare = parse_env("FSYNCER_SYNC_COMPARE", &raw)?;
        }
        if let Some(raw) = lookup("FSYNCER_SYNC_FOLLOW_SYMLINKS") {
            self.sync.follow_symlinks = parse_env("FSYNCER_SYNC_FOLLOW_SYMLINKS", &raw)?;
        }
        if let Some(raw) = lookup("FSYNCER_SYNC_DRY_RUN") {
            self.sync.dry_run = parse_env("FSYNCER_SYNC_DRY_RUN", &raw)?;
        }

        if let Some(raw) = lookup("FSYNCER_LOG_FORMAT") {
            self.logging.format = parse_env("FSYNCER_LOG_FORMAT", &raw)?;
        }
        if let Some(raw) = lookup("FSYNCER_LOG_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env("FSYNCER_LOG_MAX_SIZE_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("FSYNCER_LOG_MAX_ROTATED_FILES") {
            self.logging.max_rotated_files = parse_env("FSYNCER_LOG_MAX_ROTATED_FILES", &raw)?;
        }
        if let Some(raw) = lookup("FSYNCER_LOG_FSYNC_INTERVAL_SECS") {
            self.logging.fsync_interval_secs =
                parse_env("FSYNCER_LOG_FSYNC_INTERVAL_SECS", &raw)?;
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| SyncError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
