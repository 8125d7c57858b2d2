//! Append-only log file writer with rotation and graceful degradation.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! concurrent `tail -f` never sees interleaved partial lines.
//!
//! Degradation chain once running:
//! 1. Log file path
//! 2. stderr with `[FSY-LOG]` prefix
//! 3. Silent discard (the syncer must never crash for logging failures)
//!
//! Startup is stricter: [`LogFileWriter::open_strict`] fails when the path
//! cannot be opened so the CLI can refuse to start.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::core::errors::{Result, SyncError};

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Configuration for the log file writer.
#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub path: PathBuf,
    /// Maximum file size before rotation (bytes). 0 disables rotation.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls.
    pub fsync_interval_secs: u64,
}

impl LogFileConfig {
    /// Config for `path` with the default rotation policy (100 MiB, 5 files).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_bytes: 100 * 1024 * 1024,
            max_rotated_files: 5,
            fsync_interval_secs: 10,
        }
    }
}

/// Append-only log writer with rotation and fallback.
pub struct LogFileWriter {
    config: LogFileConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
    last_fsync: SystemTime,
}

impl LogFileWriter {
    /// Open the log file, failing if it cannot be opened for append.
    pub fn open_strict(config: LogFileConfig) -> Result<Self> {
        let (file, size) =
            open_append(&config.path).map_err(|source| SyncError::LogUnwritable {
                path: config.path.clone(),
                source,
            })?;
        Ok(Self {
            config,
            writer: Some(BufWriter::with_capacity(64 * 1024, file)),
            state: WriterState::Normal,
            bytes_written: size,
            last_fsync: SystemTime::now(),
        })
    }

    /// Erase the log file content (the `--cleanup-log` option).
    pub fn truncate(&mut self) -> Result<()> {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;
        File::create(&self.config.path).map_err(|e| SyncError::io(&self.config.path, e))?;
        let (file, size) =
            open_append(&self.config.path).map_err(|e| SyncError::io(&self.config.path, e))?;
        self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
        self.state = WriterState::Normal;
        self.bytes_written = size;
        Ok(())
    }

    /// Append one line. A trailing newline is added.
    pub fn write_line(&mut self, line: &str) {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.write_raw(&buf);
    }

    /// Flush buffers.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Force an fsync on the underlying file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
            self.last_fsync = SystemTime::now();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Number of bytes in the current file.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // ──────────────────────── internals ────────────────────────

    fn write_raw(&mut self, line: &str) {
        if self.config.max_size_bytes > 0
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
            && self.bytes_written > 0
            && self.state == WriterState::Normal
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_raw(line);
                        return;
                    }
                    self.bytes_written += line.len() as u64;
                    self.maybe_fsync();
                } else {
                    self.degrade();
                    self.write_raw(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[FSY-LOG] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn maybe_fsync(&mut self) {
        let elapsed = SystemTime::now()
            .duration_since(self.last_fsync)
            .unwrap_or(Duration::ZERO);
        if elapsed.as_secs() >= self.config.fsync_interval_secs {
            self.fsync();
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[FSY-LOG] write to {} failed, using stderr",
                    self.config.path.display()
                );
            }
            WriterState::Stderr => {
                self.state = WriterState::Discard;
            }
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = self.config.path.clone();

        // Shift existing rotations: .N→delete, .N-1→.N, …, .1→.2, current→.1
        let oldest = rotated_name(&base, self.config.max_rotated_files);
        let _ = fs::remove_file(&oldest);
        for i in (1..self.config.max_rotated_files).rev() {
            let from = rotated_name(&base, i);
            let to = rotated_name(&base, i + 1);
            let _ = rename(&from, &to);
        }
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for LogFileWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Try reopening the log file after degradation.
/// Called by the scheduler between ticks so a transient failure is not permanent.
impl LogFileWriter {
    pub fn try_recover(&mut self) {
        if self.state == WriterState::Normal {
            return;
        }
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
            self.state = WriterState::Normal;
            self.bytes_written = size;
            let _ = writeln!(
                io::stderr(),
                "[FSY-LOG] recovered log file: {}",
                self.config.path.display()
            );
        }
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> io::Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// Build a rotated filename: `sync.log` → `sync.log.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

// ──────────────────────── tests ────────────────────────
