//! Log line model: one record per event, rendered as greppable text or JSON.
//!
//! Text lines look like
//! `2026-10-19T08:00:00.000Z INFO  CREATE file docs/a.txt OK`; JSON lines are
//! self-contained objects with `None` fields omitted.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity level for log lines. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Event types matching the syncer activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SyncerStart,
    SyncerStop,
    LogCleared,
    ReplicaRootCreated,
    Create,
    Update,
    Delete,
    WalkIssue,
    TickComplete,
    Error,
}

impl EventType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SyncerStart => "START",
            Self::SyncerStop => "STOP",
            Self::LogCleared => "LOG-CLEARED",
            Self::ReplicaRootCreated => "REPLICA-ROOT",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::WalkIssue => "WALK",
            Self::TickComplete => "TICK",
            Self::Error => "ERROR",
        }
    }
}

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?} (expected text or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// A single log line. All fields optional except `ts`, `level`, `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub level: Severity,
    pub event: EventType,
    /// Entry kind (`file`, `dir`, `symlink`) for operation lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Path relative to the synced roots, or an absolute path for root-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogLine {
    /// Create a new line stamped with the current UTC time.
    pub fn new(event: EventType, level: Severity) -> Self {
        Self::at(format_utc_now(), event, level)
    }

    /// Create a line with an explicit timestamp.
    pub fn at(ts: String, event: EventType, level: Severity) -> Self {
        Self {
            ts,
            level,
            event,
            kind: None,
            path: None,
            ok: None,
            dry_run: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// Render in the requested format, without a trailing newline.
    pub fn render(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Text => self.to_text(),
            LogFormat::Json => match serde_json::to_string(self) {
                Ok(json) => json,
                // Serialization of this struct cannot fail in practice; keep the
                // line rather than losing it.
                Err(_) => self.to_text(),
            },
        }
    }

    /// Space-separated text form.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {:<5} {}", self.ts, self.level.label(), self.event.label());
        if let Some(kind) = &self.kind {
            out.push(' ');
            out.push_str(kind);
        }
        if let Some(path) = &self.path {
            out.push(' ');
            out.push_str(path);
        }
        if self.dry_run == Some(true) {
            out.push_str(" DRY-RUN");
        } else {
            match self.ok {
                Some(true) => out.push_str(" OK"),
                Some(false) => {
                    out.push_str(" FAILED");
                    if let Some(code) = &self.error_code {
                        out.push_str(" [");
                        out.push_str(code);
                        out.push(']');
                    }
                    if let Some(message) = &self.error_message {
                        out.push(' ');
                        out.push_str(message);
                    }
                }
                None => {}
            }
        }
        if let Some(details) = &self.details {
            out.push(' ');
            out.push_str(details);
        }
        out
    }
}

/// Format current UTC time as ISO 8601 with millisecond precision.
pub fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
