//! Append-only event log.
//!
//! One JSON object per line in `<state_dir>/events.log`. Every record is also
//! mirrored to `tracing` under the `events` target so it shows up in the
//! diagnostic stream at the same level.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Severity of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// One structured event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,
    pub level: EventLevel,
    pub event: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// File-backed event log shared by the loop and the control surface.
pub struct EventLog {
    path: PathBuf,
    /// Serializes appends so concurrent writers never interleave lines
    write_lock: Mutex<()>,
}

impl EventLog {
    /// Open (or create) the log under `state_dir`.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = state_dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state dir {}", dir.display()))?;

        Ok(Self {
            path: dir.join("events.log"),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, event: &str, details: serde_json::Value) {
        self.record(EventLevel::Info, event, details);
    }

    pub fn warn(&self, event: &str, details: serde_json::Value) {
        self.record(EventLevel::Warn, event, details);
    }

    pub fn error(&self, event: &str, details: serde_json::Value) {
        self.record(EventLevel::Error, event, details);
    }

    /// Append one record. Write failures are logged and otherwise ignored.
    pub fn record(&self, level: EventLevel, event: &str, details: serde_json::Value) {
        match level {
            EventLevel::Info => info!(target: "events", event, %details),
            EventLevel::Warn => warn!(target: "events", event, %details),
            EventLevel::Error => error!(target: "events", event, %details),
        }

        let record = EventRecord {
            ts: Utc::now(),
            level,
            event: event.to_string(),
            details,
        };

        if let Err(e) = self.append(&record) {
            warn!(path = %self.path.display(), error = %e, "Failed to append event");
        }
    }

    fn append(&self, record: &EventRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// The last `n` records, oldest first. Unparseable lines are skipped.
    pub fn tail(&self, n: usize) -> Result<Vec<EventRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let records: Vec<EventRecord> = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();

        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }
}
