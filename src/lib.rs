#![forbid(unsafe_code)]

//! Folder Syncer (fsyncer): one-way mirroring of a source folder onto a
//! replica folder at a fixed interval.
//!
//! Two parts:
//! 1. **Tree differ & applier**: snapshot both trees, compute the create /
//!    update / delete plan, apply it and log every operation
//! 2. **Periodic scheduler**: run a sync immediately, then once per interval
//!    until SIGINT/SIGTERM
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use folder_syncer::prelude::*;
//!
//! let syncer = Syncer::new(SyncerConfig::new("/data/source", "/data/replica"));
//! let report = syncer.run_tick(&mut ActivityLogger::null(), None);
//! println!("{} operations", report.operations());
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use folder_syncer::core::config::Config;
//! use folder_syncer::sync::snapshot::{SnapshotWalker, WalkOptions};
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod logger;
pub mod sync;
