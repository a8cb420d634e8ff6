//! JSON line-delimited event logging.
//!
//! Engine components record operational events (appends, training cycles,
//! recovered corruption) as one JSON object per line. Logging is best-effort:
//! a failed write is reported on stderr and never interrupts the operation
//! that produced the event.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

/// Append-only JSON-lines event log. A log without a path is disabled.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that drops every event.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Records one event with a timestamp and a serializable payload.
    pub fn record<T: Serialize>(&self, event: &str, payload: &T) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = append_line(path, event, payload) {
            eprintln!("failed to log event {event}: {err}");
        }
    }

    /// Records a plain message without structured payload.
    pub fn note(&self, event: &str, message: &str) {
        self.record(event, &json!({ "message": message }));
    }
}

fn append_line<T: Serialize>(path: &Path, event: &str, payload: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "event": event,
        "payload": serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
    });
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
