//! Failure classification and the optional telemetry capability.

use crate::op_mix::OpKind;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Whether the engine continues after a failure.
///
/// Every failure originating inside the engine is recoverable; the only way
/// the workload ends is an explicit stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recoverability {
    Recoverable,
}

/// Preparation step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum SetupStage {
    EnsureIndex,
    CountDocuments,
    PreloadBatch { batch: u64 },
    Sharding,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStage::EnsureIndex => f.write_str("ensure_index"),
            SetupStage::CountDocuments => f.write_str("count_documents"),
            SetupStage::PreloadBatch { batch } => write!(f, "preload_batch[{batch}]"),
            SetupStage::Sharding => f.write_str("sharding"),
        }
    }
}

/// Where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    Operation { op: OpKind },
    Setup { stage: SetupStage },
    Probe,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Operation { op } => write!(f, "operation:{op}"),
            FailureKind::Setup { stage } => write!(f, "setup:{stage}"),
            FailureKind::Probe => f.write_str("probe"),
        }
    }
}

/// A classified failure, as logged and forwarded to telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEvent {
    pub kind: FailureKind,
    pub recoverability: Recoverability,
    pub message: String,
}

impl FailureEvent {
    pub fn recoverable(kind: FailureKind, error: &dyn std::error::Error) -> Self {
        Self {
            kind,
            recoverability: Recoverability::Recoverable,
            message: error.to_string(),
        }
    }

    pub fn operation(op: OpKind, error: &dyn std::error::Error) -> Self {
        Self::recoverable(FailureKind::Operation { op }, error)
    }

    pub fn setup(stage: SetupStage, error: &dyn std::error::Error) -> Self {
        Self::recoverable(FailureKind::Setup { stage }, error)
    }

    pub fn probe(error: &dyn std::error::Error) -> Self {
        Self::recoverable(FailureKind::Probe, error)
    }
}

/// Severity of a free-form telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Structured error/event reporting.
///
/// Implementations must not block for long; they are called from worker
/// loops.
pub trait Telemetry: Send + Sync {
    fn capture_failure(&self, event: &FailureEvent);

    fn capture_message(&self, level: MessageLevel, message: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn capture_failure(&self, _event: &FailureEvent) {}

    fn capture_message(&self, _level: MessageLevel, _message: &str) {}
}

/// Keeps every event in memory; used by tests to assert on failures.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    failures: Mutex<Vec<FailureEvent>>,
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<FailureEvent> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn capture_failure(&self, event: &FailureEvent) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn capture_message(&self, level: MessageLevel, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}
