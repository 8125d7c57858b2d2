//! Plan execution against the replica tree.
//!
//! Every operation returns a `Result`; failures are turned into events and
//! the remaining operations still run. Events are handed to the logger as
//! soon as each operation finishes.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;

use crate::core::errors::{Result, SyncError};
use crate::logger::dual::{ActivityEvent, ActivityLogger};
use crate::sync::plan::{OperationKind, SyncOperation, SyncPlan};
use crate::sync::snapshot::EntryKind;

/// Outcome of a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// Planned but not executed (`--dry-run`).
    DryRun,
    Failed { code: String, reason: String },
}

impl Outcome {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(err) => Self::Failed {
                code: err.code().to_string(),
                reason: err.reason(),
            },
        }
    }
}

/// Immutable record of one attempted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub kind: EntryKind,
    /// Path relative to the roots.
    pub path: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
}

/// Result of applying one plan.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub events: Vec<SyncEvent>,
    /// The stop callback fired before every operation had run.
    pub interrupted: bool,
}

impl ApplyReport {
    pub fn failures(&self) -> usize {
        self.events.iter().filter(|e| e.outcome.is_failure()).count()
    }
}

/// Executes [`SyncPlan`]s for a fixed source/replica pair.
#[derive(Debug, Clone)]
pub struct Applier {
    source_root: PathBuf,
    replica_root: PathBuf,
    options: ApplyOptions,
}

impl Applier {
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        options: ApplyOptions,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            options,
        }
    }

    /// Run every operation of `plan` in order: deletions, then upserts.
    ///
    /// `should_stop` is polled before each operation; a copy already in
    /// progress always finishes.
    pub fn apply(
        &self,
        plan: &SyncPlan,
        logger: &mut ActivityLogger,
        should_stop: Option<&dyn Fn() -> bool>,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        for op in plan.iter() {
            if should_stop.is_some_and(|stop| stop()) {
                report.interrupted = true;
                break;
            }

            let outcome = if self.options.dry_run {
                Outcome::DryRun
            } else {
                Outcome::from_result(self.execute(op))
            };

            let event = SyncEvent {
                timestamp: Utc::now(),
                operation: op.operation_kind(),
                kind: op.entry_kind(),
                path: op.path().to_path_buf(),
                outcome,
            };
            logger.log(&ActivityEvent::Operation(event.clone()));
            report.events.push(event);
        }

        report
    }

    fn execute(&self, op: &SyncOperation) -> Result<()> {
        let rel = op.path();
        let src = self.source_root.join(rel);
        let dst = self.replica_root.join(rel);

        match op {
            SyncOperation::Delete { kind, .. } => remove_entry(&dst, *kind),
            SyncOperation::Create {
                kind: EntryKind::Directory,
                ..
            } => create_directory(&dst),
            SyncOperation::Create { .. } | SyncOperation::UpdateContent { .. } => {
                copy_file(&src, &dst)
            }
        }
    }
}

fn remove_entry(path: &Path, kind: EntryKind) -> Result<()> {
    let result = match kind {
        EntryKind::Directory => fs::remove_dir_all(path),
        EntryKind::File | EntryKind::Symlink | EntryKind::Other => fs::remove_file(path),
    };
    match result {
        Ok(()) => Ok(()),
        // Already gone: the replica is in the wanted state.
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SyncError::from_io(path, err)),
    }
}

fn create_directory(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err(SyncError::from_io(path, err)),
    }
}

/// Full-content copy through a uniquely named temporary sibling, persisted
/// over the target. Permission bits come along with `fs::copy`; the mtime is
/// set explicitly. The temporary file is removed on every failure path.
fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let src_meta = fs::metadata(src).map_err(|e| SyncError::from_io(src, e))?;
    if !src_meta.is_file() {
        return Err(SyncError::Unsupported {
            path: src.to_path_buf(),
            details: "source entry is no longer a regular file".to_string(),
        });
    }

    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".fsyncer-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| SyncError::from_io(parent, e))?;

    fs::copy(src, tmp.path()).map_err(|e| classify_copy_error(src, tmp.path(), e))?;
    let mtime = FileTime::from_last_modification_time(&src_meta);
    filetime::set_file_mtime(tmp.path(), mtime)
        .map_err(|e| SyncError::from_io(tmp.path(), e))?;
    tmp.persist(dst)
        .map_err(|e| SyncError::from_io(dst, e.error))?;
    Ok(())
}

/// `fs::copy` does not say which side failed; a source that no longer opens
/// is reported against the source path.
fn classify_copy_error(src: &Path, tmp: &Path, err: std::io::Error) -> SyncError {
    if fs::File::open(src).is_err() {
        SyncError::from_io(src, err)
    } else {
        SyncError::from_io(tmp, err)
    }
}
