//! Dual-output activity logger: every event goes to the log file and is
//! mirrored to the console.
//!
//! The logger is an explicit value created at startup and passed by `&mut`
//! into the syncer and the scheduler. Each sink has its own severity
//! threshold: the file records INFO and above, the console INFO (or DEBUG
//! when verbose).

#![allow(missing_docs)]

use std::io::{self, Write};
use std::path::PathBuf;

use crate::core::paths::display_relative;
use crate::logger::file::LogFileWriter;
use crate::logger::line::{EventType, LogFormat, LogLine, Severity};
use crate::sync::apply::{Outcome, SyncEvent};
use crate::sync::checksum::CompareMode;
use crate::sync::plan::OperationKind;
use crate::sync::snapshot::WalkIssue;

// ──────────────────── public event type ────────────────────

/// Events that can be logged through the activity logger.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SyncerStarted {
        version: String,
        source: PathBuf,
        replica: PathBuf,
        interval_secs: f64,
        compare: CompareMode,
        dry_run: bool,
        config_hash: String,
    },
    SyncerStopped {
        reason: String,
        uptime_secs: u64,
        ticks: u64,
    },
    LogCleared {
        path: PathBuf,
    },
    ReplicaRootCreated {
        path: PathBuf,
        dry_run: bool,
    },
    Operation(SyncEvent),
    WalkIssue(WalkIssue),
    TickCompleted {
        tick: u64,
        operations: usize,
        failures: usize,
        duration_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
}

// ──────────────────── options ────────────────────

/// Console and encoding options.
#[derive(Debug, Clone, Copy)]
pub struct ActivityLoggerOptions {
    pub format: LogFormat,
    /// Mirror lines to stdout.
    pub console: bool,
    /// Show DEBUG lines on the console.
    pub verbose: bool,
}

impl Default for ActivityLoggerOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            console: true,
            verbose: false,
        }
    }
}

// ──────────────────── logger ────────────────────

/// File + console activity logger.
pub struct ActivityLogger {
    file: Option<LogFileWriter>,
    console: Option<Box<dyn Write + Send>>,
    colorize: bool,
    format: LogFormat,
    console_threshold: Severity,
    file_threshold: Severity,
    lines_written: u64,
}

impl ActivityLogger {
    /// Logger writing to `file` and, unless disabled, to stdout.
    pub fn new(file: LogFileWriter, options: ActivityLoggerOptions) -> Self {
        let console: Option<Box<dyn Write + Send>> = if options.console {
            Some(Box::new(io::stdout()))
        } else {
            None
        };
        Self {
            file: Some(file),
            console,
            colorize: options.console && options.format == LogFormat::Text,
            format: options.format,
            console_threshold: if options.verbose {
                Severity::Debug
            } else {
                Severity::Info
            },
            file_threshold: Severity::Info,
            lines_written: 0,
        }
    }

    /// Logger that drops everything. For library callers and tests.
    pub fn null() -> Self {
        Self {
            file: None,
            console: None,
            colorize: false,
            format: LogFormat::Text,
            console_threshold: Severity::Info,
            file_threshold: Severity::Info,
            lines_written: 0,
        }
    }

    /// Replace the console sink (uncoloured). Used to capture the console
    /// stream in tests.
    #[must_use]
    pub fn with_console_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.console = Some(writer);
        self.colorize = false;
        self
    }

    /// Lower the console threshold to DEBUG.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.console_threshold = if verbose {
            Severity::Debug
        } else {
            Severity::Info
        };
        self
    }

    /// Render and write one event to every sink whose threshold it meets.
    pub fn log(&mut self, event: &ActivityEvent) {
        let line = event_to_log_line(event);
        let rendered = line.render(self.format);
        let mut written = false;

        if line.level >= self.file_threshold
            && let Some(file) = self.file.as_mut()
        {
            file.write_line(&rendered);
            written = true;
        }

        if line.level >= self.console_threshold
            && let Some(console) = self.console.as_mut()
        {
            let shown = if self.colorize {
                paint(&rendered, line.level)
            } else {
                rendered
            };
            // A closed stdout must not take the syncer down.
            let _ = writeln!(console, "{shown}");
            written = true;
        }

        if written {
            self.lines_written += 1;
        }
    }

    /// Number of lines that reached at least one sink.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            file.flush();
        }
        if let Some(console) = self.console.as_mut() {
            let _ = console.flush();
        }
    }

    /// Reopen a degraded log file. Called between ticks.
    pub fn try_recover(&mut self) {
        if let Some(file) = self.file.as_mut() {
            file.try_recover();
        }
    }

    /// Flush and fsync everything. The logger stays usable afterwards.
    pub fn shutdown(&mut self) {
        self.flush();
        if let Some(file) = self.file.as_mut() {
            file.fsync();
        }
    }
}

#[cfg(feature = "cli")]
fn paint(rendered: &str, level: Severity) -> String {
    use colored::Colorize;
    match level {
        Severity::Debug => rendered.dimmed().to_string(),
        Severity::Info => rendered.to_string(),
        Severity::Warning => rendered.yellow().to_string(),
        Severity::Error => rendered.red().to_string(),
    }
}

#[cfg(not(feature = "cli"))]
fn paint(rendered: &str, _level: Severity) -> String {
    rendered.to_string()
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_line(event: &ActivityEvent) -> LogLine {
    match event {
        ActivityEvent::SyncerStarted {
            version,
            source,
            replica,
            interval_secs,
            compare,
            dry_run,
            config_hash,
        } => {
            let mut e = LogLine::new(EventType::SyncerStart, Severity::Info);
            let mut details = format!(
                "version={version} source={} replica={} interval={interval_secs}s compare={compare} config_hash={config_hash}",
                source.display(),
                replica.display()
            );
            if *dry_run {
                details.push_str(" dry_run=true");
            }
            e.details = Some(details);
            e.ok = Some(true);
            e
        }
        ActivityEvent::SyncerStopped {
            reason,
            uptime_secs,
            ticks,
        } => {
            let mut e = LogLine::new(EventType::SyncerStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s ticks={ticks}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::LogCleared { path } => {
            let mut e = LogLine::new(EventType::LogCleared, Severity::Info);
            e.path = Some(path.display().to_string());
            e.ok = Some(true);
            e
        }
        ActivityEvent::ReplicaRootCreated { path, dry_run } => {
            let mut e = LogLine::new(EventType::ReplicaRootCreated, Severity::Info);
            e.kind = Some("dir".to_string());
            e.path = Some(path.display().to_string());
            e.ok = Some(true);
            if *dry_run {
                e.dry_run = Some(true);
            }
            e
        }
        ActivityEvent::Operation(op) => operation_line(op),
        ActivityEvent::WalkIssue(issue) => {
            let mut e = LogLine::new(EventType::WalkIssue, Severity::Warning);
            e.path = Some(display_relative(&issue.path));
            e.error_code = Some(issue.code.clone());
            e.details = Some(format!(
                "{} in {}: {}",
                issue.kind.label(),
                issue.side.label(),
                issue.reason
            ));
            e
        }
        ActivityEvent::TickCompleted {
            tick,
            operations,
            failures,
            duration_ms,
        } => {
            let mut e = LogLine::new(EventType::TickComplete, Severity::Debug);
            e.details = Some(format!(
                "tick={tick} operations={operations} failures={failures} duration={duration_ms}ms"
            ));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogLine::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
    }
}

fn operation_line(op: &SyncEvent) -> LogLine {
    let event_type = match op.operation {
        OperationKind::Create => EventType::Create,
        OperationKind::Update => EventType::Update,
        OperationKind::Delete => EventType::Delete,
    };
    let level = if op.outcome.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    let ts = op
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let mut e = LogLine::at(ts, event_type, level);
    e.kind = Some(op.kind.label().to_string());
    e.path = Some(display_relative(&op.path));
    match &op.outcome {
        Outcome::Ok => e.ok = Some(true),
        Outcome::DryRun => {
            e.ok = Some(true);
            e.dry_run = Some(true);
        }
        Outcome::Failed { code, reason } => {
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(reason.clone());
        }
    }
    e
}

// ──────────────────── tests ────────────────────
