//! Periodic scheduler: run a tick immediately, then one tick per interval,
//! until a shutdown signal arrives.
//!
//! Fixed-delay policy: the interval is the sleep between the end of one tick
//! and the start of the next. Tick duration is never subtracted.
//!
//! The sleep is cut into short slices so SIGINT/SIGTERM end it promptly and
//! SIGUSR1 can start the next tick early. Inside a tick, cancellation is only
//! checked between operations.

#![allow(missing_docs)]

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::errors::{Result, SyncError};
use crate::daemon::signals::SignalHandler;
use crate::logger::dual::{ActivityEvent, ActivityLogger};
use crate::sync::engine::Syncer;

/// Longest uninterrupted sleep between two signal polls.
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Parse a user-supplied interval in seconds (integer or decimal).
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SyncError::InvalidInterval {
            raw: raw.to_string(),
            reason: "not a number".to_string(),
        })?;
    interval_from_secs(secs).map_err(|err| match err {
        SyncError::InvalidInterval { reason, .. } => SyncError::InvalidInterval {
            raw: raw.to_string(),
            reason,
        },
        other => other,
    })
}

/// Validate a numeric interval: positive and finite.
pub fn interval_from_secs(secs: f64) -> Result<Duration> {
    let invalid = |reason: &str| SyncError::InvalidInterval {
        raw: secs.to_string(),
        reason: reason.to_string(),
    };
    if !secs.is_finite() {
        return Err(invalid("must be a finite number of seconds"));
    }
    if secs <= 0.0 {
        return Err(invalid("must be greater than zero"));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid("too large"))
}

/// Why the scheduler loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// SIGINT/SIGTERM or a programmatic shutdown request.
    Signal,
    /// The configured tick budget was used up (`--once`).
    MaxTicks,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Signal => "signal",
            Self::MaxTicks => "max_ticks",
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Stop after this many ticks. `None` runs until interrupted.
    pub max_ticks: Option<u64>,
    /// Logged with the start line.
    pub config_hash: String,
}

impl SchedulerConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
            config_hash: "-".to_string(),
        }
    }
}

/// Totals over a whole scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub ticks: u64,
    pub operations: usize,
    pub failures: usize,
    pub stop_reason: StopReason,
}

enum Wake {
    Elapsed,
    SyncNow,
    Shutdown,
}

pub struct Scheduler {
    config: SchedulerConfig,
    syncer: Syncer,
    signals: SignalHandler,
}

impl Scheduler {
    /// Fails fast on a zero interval, before any tick.
    pub fn new(config: SchedulerConfig, syncer: Syncer, signals: SignalHandler) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(SyncError::InvalidInterval {
                raw: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            config,
            syncer,
            signals,
        })
    }

    pub fn signals(&self) -> &SignalHandler {
        &self.signals
    }

    /// Run until shutdown (or `max_ticks`). Tick failures never end the loop.
    pub fn run(&self, logger: &mut ActivityLogger) -> SchedulerSummary {
        let started = Instant::now();
        let syncer_config = self.syncer.config();
        logger.log(&ActivityEvent::SyncerStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            source: syncer_config.source.clone(),
            replica: syncer_config.replica.clone(),
            interval_secs: self.config.interval.as_secs_f64(),
            compare: syncer_config.compare,
            dry_run: syncer_config.dry_run,
            config_hash: self.config.config_hash.clone(),
        });
        logger.flush();

        let mut ticks: u64 = 0;
        let mut operations = 0;
        let mut failures = 0;
        let signals = &self.signals;
        let should_stop = || signals.should_shutdown();

        let stop_reason = loop {
            if signals.should_shutdown() {
                break StopReason::Signal;
            }

            ticks += 1;
            let report = self.syncer.run_tick(logger, Some(&should_stop));
            operations += report.operations();
            failures += report.failures();
            logger.log(&ActivityEvent::TickCompleted {
                tick: ticks,
                operations: report.operations(),
                failures: report.failures(),
                duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            });
            logger.flush();

            if report.interrupted {
                break StopReason::Signal;
            }
            if self.config.max_ticks.is_some_and(|max| ticks >= max) {
                break StopReason::MaxTicks;
            }
            match self.sleep() {
                Wake::Shutdown => break StopReason::Signal,
                Wake::Elapsed | Wake::SyncNow => {}
            }
            logger.try_recover();
        };

        logger.log(&ActivityEvent::SyncerStopped {
            reason: stop_reason.to_string(),
            uptime_secs: started.elapsed().as_secs(),
            ticks,
        });
        logger.shutdown();

        SchedulerSummary {
            ticks,
            operations,
            failures,
            stop_reason,
        }
    }

    fn sleep(&self) -> Wake {
        let deadline = Instant::now() + self.config.interval;
        loop {
            if self.signals.should_shutdown() {
                return Wake::Shutdown;
            }
            if self.signals.should_sync_now() {
                return Wake::SyncNow;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Elapsed;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
