//! File-backed telemetry sink.

use anyhow::{Context, Result};
use liveness_engine::{FailureEvent, MessageLevel, Telemetry};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Single telemetry entry (one JSON line)
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TelemetryEntry<'a> {
    Failure {
        timestamp: String,
        #[serde(flatten)]
        event: &'a FailureEvent,
    },
    Message {
        timestamp: String,
        level: MessageLevel,
        message: &'a str,
    },
}

/// Appends one JSON object per event to a file.
pub struct JsonlTelemetry {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlTelemetry {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open telemetry file {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_entry(&self, entry: &TelemetryEntry<'_>) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize telemetry entry: {}", e);
                return;
            }
        };

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}") {
            warn!("Failed to write telemetry to {}: {}", self.path.display(), e);
        }
    }
}

impl Telemetry for JsonlTelemetry {
    fn capture_failure(&self, event: &FailureEvent) {
        self.write_entry(&TelemetryEntry::Failure {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
        });
    }

    fn capture_message(&self, level: MessageLevel, message: &str) {
        self.write_entry(&TelemetryEntry::Message {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            message,
        });
    }
}
