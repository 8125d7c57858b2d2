//! FSY-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Top-level error type for the folder syncer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("[FSY-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FSY-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FSY-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FSY-1101] invalid sync interval {raw:?}: {reason}")]
    InvalidInterval { raw: String, reason: String },

    #[error("[FSY-1201] source folder does not exist: {path}")]
    SourceMissing { path: PathBuf },

    #[error("[FSY-1202] not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("[FSY-1301] log file {path} is not writable: {source}")]
    LogUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FSY-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FSY-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[FSY-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FSY-3003] path vanished: {path}")]
    NotFound { path: PathBuf },

    #[error("[FSY-3004] unsupported entry at {path}: {details}")]
    Unsupported { path: PathBuf, details: String },
}

impl SyncError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FSY-1001",
            Self::MissingConfig { .. } => "FSY-1002",
            Self::ConfigParse { .. } => "FSY-1003",
            Self::InvalidInterval { .. } => "FSY-1101",
            Self::SourceMissing { .. } => "FSY-1201",
            Self::NotADirectory { .. } => "FSY-1202",
            Self::LogUnwritable { .. } => "FSY-1301",
            Self::Serialization { .. } => "FSY-2101",
            Self::PermissionDenied { .. } => "FSY-3001",
            Self::Io { .. } => "FSY-3002",
            Self::NotFound { .. } => "FSY-3003",
            Self::Unsupported { .. } => "FSY-3004",
        }
    }

    /// Whether this error must stop the process before the first tick.
    #[must_use]
    pub const fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidInterval { .. }
                | Self::SourceMissing { .. }
                | Self::NotADirectory { .. }
                | Self::LogUnwritable { .. }
        )
    }

    /// Human-readable message without the `[FSY-xxxx]` prefix, for log lines
    /// that carry the code in a separate field.
    #[must_use]
    pub fn reason(&self) -> String {
        let full = self.to_string();
        match full.split_once("] ") {
            Some((_, rest)) => rest.to_string(),
            None => full,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Classify an IO error by kind. Permission and not-found failures get
    /// their own codes so log readers can tell them apart from disk errors.
    #[must_use]
    pub fn from_io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_variant() -> Vec<SyncError> {
        vec![
            SyncError::InvalidConfig {
                details: String::new(),
            },
            SyncError::MissingConfig {
                path: PathBuf::new(),
            },
            SyncError::ConfigParse {
                context: "",
                details: String::new(),
            },
            SyncError::InvalidInterval {
                raw: String::new(),
                reason: String::new(),
            },
            SyncError::SourceMissing {
                path: PathBuf::new(),
            },
            SyncError::NotADirectory {
                path: PathBuf::new(),
            },
            SyncError::LogUnwritable {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            SyncError::Serialization {
                context: "",
                details: String::new(),
            },
            SyncError::PermissionDenied {
                path: PathBuf::new(),
            },
            SyncError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            SyncError::NotFound {
                path: PathBuf::new(),
            },
            SyncError::Unsupported {
                path: PathBuf::new(),
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = every_variant();
        let codes: Vec<&str> = errors.iter().map(SyncError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_carries_code_prefix() {
        for err in every_variant() {
            let msg = err.to_string();
            assert!(
                msg.starts_with(&format!("[{}]", err.code())),
                "display should start with its code: {msg}"
            );
        }
    }

    #[test]
    fn startup_classification() {
        assert!(
            SyncError::InvalidInterval {
                raw: "-1".to_string(),
                reason: "must be positive".to_string(),
            }
            .is_startup()
        );
        assert!(
            SyncError::SourceMissing {
                path: PathBuf::from("/nope")
            }
            .is_startup()
        );
        assert!(
            !SyncError::PermissionDenied {
                path: PathBuf::new()
            }
            .is_startup()
        );
        assert!(
            SyncError::LogUnwritable {
                path: PathBuf::from("/var/log"),
                source: std::io::Error::other("is a directory"),
            }
            .is_startup()
        );
    }

    #[test]
    fn from_io_maps_error_kinds() {
        let denied = SyncError::from_io(
            "/r/a.txt",
            std::io::Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(denied.code(), "FSY-3001");

        let gone = SyncError::from_io("/r/a.txt", std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert_eq!(gone.code(), "FSY-3003");

        let other = SyncError::from_io("/r/a.txt", std::io::Error::other("disk full"));
        assert_eq!(other.code(), "FSY-3002");
        assert!(other.to_string().contains("/r/a.txt"));
    }

    #[test]
    fn reason_strips_code_prefix() {
        let err = SyncError::NotFound {
            path: PathBuf::from("/r/b.txt"),
        };
        assert_eq!(err.reason(), "path vanished: /r/b.txt");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SyncError = json_err.into();
        assert_eq!(err.code(), "FSY-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: SyncError = toml_err.into();
        assert_eq!(err.code(), "FSY-1003");
    }
}
