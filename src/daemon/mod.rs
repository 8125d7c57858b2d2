//! Daemon subsystem: the periodic scheduler and signal handling.

#[cfg(feature = "daemon")]
pub mod scheduler;
#[cfg(feature = "daemon")]
pub mod signals;
