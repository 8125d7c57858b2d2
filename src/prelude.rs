//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use folder_syncer::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SyncError};

// Sync
pub use crate::sync::apply::{Applier, ApplyOptions, Outcome, SyncEvent};
pub use crate::sync::checksum::{CompareMode, ContentComparer, FileComparer};
pub use crate::sync::engine::{Syncer, SyncerConfig, TickReport};
pub use crate::sync::plan::{OperationKind, SyncOperation, SyncPlan, diff};
pub use crate::sync::snapshot::{
    DirectorySnapshot, EntryKind, SnapshotWalker, TreeSide, WalkOptions,
};

// Logger
pub use crate::logger::dual::{ActivityEvent, ActivityLogger, ActivityLoggerOptions};
pub use crate::logger::file::{LogFileConfig, LogFileWriter};
pub use crate::logger::line::LogFormat;

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::scheduler::{Scheduler, SchedulerConfig, SchedulerSummary, parse_interval};
#[cfg(feature = "daemon")]
pub use crate::daemon::signals::SignalHandler;
