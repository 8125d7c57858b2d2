//! Top-level CLI definition and dispatch.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use colored::control;
use thiserror::Error;

use folder_syncer::core::config::Config;
use folder_syncer::core::errors::SyncError;
use folder_syncer::core::paths::resolve_absolute_path;
use folder_syncer::daemon::scheduler::{Scheduler, SchedulerConfig, parse_interval};
use folder_syncer::daemon::signals::SignalHandler;
use folder_syncer::logger::dual::{ActivityEvent, ActivityLogger, ActivityLoggerOptions};
use folder_syncer::logger::file::{LogFileConfig, LogFileWriter};
use folder_syncer::logger::line::LogFormat;
use folder_syncer::sync::checksum::CompareMode;
use folder_syncer::sync::engine::{Syncer, SyncerConfig};

/// One-way folder mirroring at a fixed interval.
#[derive(Debug, Parser)]
#[command(
    name = "fsyncer",
    author,
    version,
    about = "Folder Syncer - one-way periodic folder mirroring",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Authoritative folder to mirror from.
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
    /// Folder kept as an exact copy of SOURCE (created if absent).
    #[arg(value_name = "REPLICA")]
    replica: PathBuf,
    /// Seconds between the end of one sync and the start of the next.
    #[arg(value_name = "INTERVAL_SECS", allow_negative_numbers = true)]
    interval: String,
    /// Log file, opened in append mode.
    #[arg(value_name = "LOG_FILE")]
    log_file: PathBuf,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Show debug lines (tick summaries) on the console.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Do not mirror log lines to the console.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Erase the log file before starting.
    #[arg(short = 'c', long)]
    cleanup_log: bool,
    /// Run a single sync and exit.
    #[arg(long)]
    once: bool,
    /// Log planned operations without touching the replica.
    #[arg(long)]
    dry_run: bool,
    /// How file content equality is decided.
    #[arg(long, value_enum, value_name = "MODE")]
    compare: Option<CompareArg>,
    /// Copy what source symlinks point at instead of skipping them.
    #[arg(long)]
    follow_symlinks: bool,
    /// Log line encoding.
    #[arg(long, value_enum, value_name = "FORMAT")]
    log_format: Option<LogFormatArg>,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CompareArg {
    Checksum,
    Metadata,
}

impl From<CompareArg> for CompareMode {
    fn from(value: CompareArg) -> Self {
        match value {
            CompareArg::Checksum => Self::Checksum,
            CompareArg::Metadata => Self::Metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI-level error classification mapped to process exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input (arguments, config, source folder).
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// The run finished but some operations failed.
    #[error("{0}")]
    Partial(String),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) => 2,
            Self::Internal(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match &err {
            SyncError::Serialization { .. } => Self::Internal(message),
            // A log path we cannot write is an environment problem, not bad input.
            SyncError::LogUnwritable { .. } => Self::Runtime(message),
            _ if err.is_startup() => Self::User(message),
            _ => Self::Runtime(message),
        }
    }
}

/// Validate everything, then run the scheduler until interrupted.
///
/// Startup order: interval, config, roots, log file. Nothing is written to
/// the replica or the log before all checks pass.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    let interval = parse_interval(&cli.interval)?;
    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, cli, interval.as_secs_f64());
    config.validate()?;

    let syncer = Syncer::new(SyncerConfig::from_config(
        resolve_absolute_path(&cli.source),
        resolve_absolute_path(&cli.replica),
        &config,
    ));
    syncer.check_roots()?;

    let mut file = LogFileWriter::open_strict(LogFileConfig {
        path: cli.log_file.clone(),
        max_size_bytes: config.logging.max_size_bytes,
        max_rotated_files: config.logging.max_rotated_files,
        fsync_interval_secs: config.logging.fsync_interval_secs,
    })?;
    if cli.cleanup_log {
        file.truncate()?;
    }

    let mut logger = ActivityLogger::new(
        file,
        ActivityLoggerOptions {
            format: config.logging.format,
            console: config.logging.console,
            verbose: config.logging.verbose,
        },
    );
    if cli.cleanup_log {
        logger.log(&ActivityEvent::LogCleared {
            path: cli.log_file.clone(),
        });
    }

    let mut scheduler_config = SchedulerConfig::new(interval);
    scheduler_config.max_ticks = cli.once.then_some(1);
    scheduler_config.config_hash = config.stable_hash()?;
    let scheduler = Scheduler::new(scheduler_config, syncer, SignalHandler::new())?;

    let summary = scheduler.run(&mut logger);
    if cli.once && summary.failures > 0 {
        return Err(CliError::Partial(format!(
            "{} of {} operations failed",
            summary.failures, summary.operations
        )));
    }
    Ok(())
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli, interval_secs: f64) {
    config.sync.interval_secs = interval_secs;
    if let Some(compare) = cli.compare {
        config.sync.compare = compare.into();
    }
    if cli.follow_symlinks {
        config.sync.follow_symlinks = true;
    }
    if cli.dry_run {
        config.sync.dry_run = true;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    if cli.verbose {
        config.logging.verbose = true;
    }
    if cli.quiet {
        config.logging.console = false;
        config.logging.verbose = false;
    }
}
