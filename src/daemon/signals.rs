//! Signal handling: SIGTERM/SIGINT graceful shutdown and SIGUSR1 immediate
//! sync trigger.
//!
//! Uses the `signal-hook` crate for safe signal registration. The scheduler
//! polls `SignalHandler` flags during its sliced sleep rather than blocking on
//! signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the signal handler and the scheduler.
///
/// All flags use `Ordering::Relaxed` because the scheduler polls them every
/// sleep slice and exact ordering with other atomics is not required.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    sync_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a new handler and register OS signal hooks.
    ///
    /// On Unix: SIGTERM/SIGINT -> shutdown, SIGUSR1 -> sync now.
    /// Registration is best-effort; failures are reported on stderr but not fatal.
    pub fn new() -> Self {
        let handler = Self::detached();
        handler.register_signals();
        handler
    }

    /// Handler with no OS hooks. Flags only change through the `request_*`
    /// methods, which keeps library callers and tests free of process-wide state.
    pub fn detached() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            sync_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether an immediate sync has been requested.
    pub fn should_sync_now(&self) -> bool {
        self.sync_flag.swap(false, Ordering::Relaxed)
    }

    /// Programmatically request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// Programmatically request an immediate sync.
    pub fn request_sync(&self) {
        self.sync_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        // SIGTERM / SIGINT -> shutdown
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[FSY-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[FSY-SIGNAL] failed to register SIGINT: {e}");
        }

        // SIGUSR1 -> immediate sync (Unix only)
        #[cfg(unix)]
        {
            use signal_hook::consts::SIGUSR1;
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.sync_flag)) {
                eprintln!("[FSY-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
