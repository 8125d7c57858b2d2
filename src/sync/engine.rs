//! One synchronization tick: check roots, snapshot both trees, diff, apply.
//!
//! Nothing in a tick propagates as an error. Root problems are logged and end
//! the tick early; per-path failures are logged by the applier.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::core::config::Config;
use crate::core::errors::{Result, SyncError};
use crate::core::paths::trees_overlap;
use crate::logger::dual::{ActivityEvent, ActivityLogger};
use crate::sync::apply::{Applier, ApplyOptions, SyncEvent};
use crate::sync::checksum::{CompareMode, FileComparer};
use crate::sync::plan::{SyncPlan, diff};
use crate::sync::snapshot::{
    DirectorySnapshot, SnapshotWalker, TreeSide, WalkIssue, WalkIssueKind, WalkOptions,
};

type IssueKey = (TreeSide, WalkIssueKind, PathBuf);

/// Everything one syncer needs to know about its pair of trees.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncerConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub compare: CompareMode,
    pub follow_symlinks: bool,
    pub dry_run: bool,
}

impl SyncerConfig {
    /// Defaults for everything but the two roots.
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            compare: CompareMode::default(),
            follow_symlinks: false,
            dry_run: false,
        }
    }

    pub fn from_config(
        source: impl Into<PathBuf>,
        replica: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            compare: config.sync.compare,
            follow_symlinks: config.sync.follow_symlinks,
            dry_run: config.sync.dry_run,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: Vec<SyncEvent>,
    /// Every walk issue met this tick, including ones already logged earlier.
    pub walk_issues: Vec<WalkIssue>,
    pub duration: Duration,
    /// Shutdown was requested while operations were still pending.
    pub interrupted: bool,
    /// A root problem ended the tick before the diff.
    pub aborted: bool,
}

impl TickReport {
    pub fn operations(&self) -> usize {
        self.events.len()
    }

    pub fn failures(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.outcome.is_failure())
            .count()
    }
}

/// Mirrors one source tree onto one replica tree.
#[derive(Debug, Clone)]
pub struct Syncer {
    config: SyncerConfig,
    walker: SnapshotWalker,
    /// Walk issues seen on the previous tick; only new ones are logged.
    reported: RefCell<HashSet<IssueKey>>,
}

impl Syncer {
    pub fn new(config: SyncerConfig) -> Self {
        let walker = SnapshotWalker::new(WalkOptions {
            follow_symlinks: config.follow_symlinks,
        });
        Self {
            config,
            walker,
            reported: RefCell::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &SyncerConfig {
        &self.config
    }

    /// Startup validation: the source must be an existing directory, the
    /// replica must not be a non-directory, and neither tree may contain the
    /// other.
    pub fn check_roots(&self) -> Result<()> {
        check_source(&self.config.source)?;
        match fs::metadata(&self.config.replica) {
            Ok(meta) if !meta.is_dir() => {
                return Err(SyncError::NotADirectory {
                    path: self.config.replica.clone(),
                });
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(SyncError::from_io(&self.config.replica, err)),
        }
        if trees_overlap(&self.config.source, &self.config.replica) {
            return Err(SyncError::InvalidConfig {
                details: format!(
                    "source {} and replica {} overlap",
                    self.config.source.display(),
                    self.config.replica.display()
                ),
            });
        }
        Ok(())
    }

    /// Walk both trees and diff them without touching anything.
    pub fn plan(&self) -> SyncPlan {
        let (source, replica) = self.snapshots();
        self.diff(&source, &replica)
    }

    /// Applier bound to this syncer's roots and options.
    pub fn applier(&self) -> Applier {
        Applier::new(
            &self.config.source,
            &self.config.replica,
            ApplyOptions {
                dry_run: self.config.dry_run,
            },
        )
    }

    /// Run one complete tick.
    pub fn run_tick(
        &self,
        logger: &mut ActivityLogger,
        should_stop: Option<&dyn Fn() -> bool>,
    ) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::default();

        if let Err(err) = self.prepare_roots(logger) {
            logger.log(&ActivityEvent::Error {
                code: err.code().to_string(),
                message: err.reason(),
            });
            report.aborted = true;
            report.duration = started.elapsed();
            return report;
        }

        let (source, replica) = self.snapshots();
        report.walk_issues = source
            .issues()
            .iter()
            .chain(replica.issues())
            .cloned()
            .collect();
        self.log_new_issues(&report.walk_issues, logger);

        let plan = self.diff(&source, &replica);
        let applied = self.applier().apply(&plan, logger, should_stop);
        report.events = applied.events;
        report.interrupted = applied.interrupted;
        report.duration = started.elapsed();
        report
    }

    /// Log issues not seen on the previous tick. An issue that clears and
    /// later comes back is logged again.
    fn log_new_issues(&self, issues: &[WalkIssue], logger: &mut ActivityLogger) {
        let mut reported = self.reported.borrow_mut();
        let mut current = HashSet::with_capacity(issues.len());
        for issue in issues {
            let key = (issue.side, issue.kind, issue.path.clone());
            if !reported.contains(&key) {
                logger.log(&ActivityEvent::WalkIssue(issue.clone()));
            }
            current.insert(key);
        }
        *reported = current;
    }

    fn snapshots(&self) -> (DirectorySnapshot, DirectorySnapshot) {
        let source = self.walker.walk(&self.config.source, TreeSide::Source);
        let replica = self.walker.walk(&self.config.replica, TreeSide::Replica);
        (source, replica)
    }

    fn diff(&self, source: &DirectorySnapshot, replica: &DirectorySnapshot) -> SyncPlan {
        let comparer =
            FileComparer::new(self.config.compare, &self.config.source, &self.config.replica);
        diff(source, replica, &comparer)
    }

    /// Tick-time root checks. Creates the replica root when it is missing.
    fn prepare_roots(&self, logger: &mut ActivityLogger) -> Result<()> {
        check_source(&self.config.source)?;

        let replica = &self.config.replica;
        match fs::metadata(replica) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SyncError::NotADirectory {
                path: replica.clone(),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if !self.config.dry_run {
                    fs::create_dir_all(replica).map_err(|e| SyncError::from_io(replica, e))?;
                }
                logger.log(&ActivityEvent::ReplicaRootCreated {
                    path: replica.clone(),
                    dry_run: self.config.dry_run,
                });
                Ok(())
            }
            Err(err) => Err(SyncError::from_io(replica, err)),
        }
    }
}

fn check_source(source: &Path) -> Result<()> {
    match fs::metadata(source) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::NotADirectory {
            path: source.to_path_buf(),
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(SyncError::SourceMissing {
            path: source.to_path_buf(),
        }),
        Err(err) => Err(SyncError::from_io(source, err)),
    }
}
