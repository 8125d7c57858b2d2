//! Activity logging: line model, append-only log file, and the dual
//! file + console logger.

pub mod dual;
pub mod file;
pub mod line;
