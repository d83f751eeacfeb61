//! Rate-limited concurrent workload engine for MongoDB liveness probing.
//!
//! A [`WorkloadEngine`] prepares a collection (key index plus preload up to a
//! target size), then runs a pool of worker tasks and one health prober until
//! stopped. Each worker loop:
//!
//! 1. acquires a token from the shared [`TokenBucket`],
//! 2. picks an [`OpKind`] with the [`OperationSelector`],
//! 3. runs a find, insert or upsert against the [`Collection`] capability,
//! 4. on failure logs it, reports a [`FailureEvent`] to [`Telemetry`], pauses
//!    briefly and continues.
//!
//! No failure inside the engine is fatal; only [`WorkloadEngine::stop`] ends
//! the workload.
//!
//! The database is consumed through the [`Database`] and [`Collection`]
//! traits. [`MemoryDatabase`] implements them in-process.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod op_mix;
pub mod prober;
pub mod rate_limiter;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use config::{EngineTuning, WorkloadConfig};
pub use engine::{EngineState, WorkloadEngine};
pub use error::{AcquireError, EngineError, StoreError};
pub use memory::{MemoryDatabase, MemoryOp};
pub use op_mix::{OpKind, OpMix, OperationSelector};
pub use prober::HealthProber;
pub use rate_limiter::TokenBucket;
pub use stats::{EngineStats, StatsSnapshot};
pub use store::{Collection, Database};
pub use telemetry::{
    FailureEvent, FailureKind, MessageLevel, NoopTelemetry, RecordingTelemetry, Recoverability,
    SetupStage, Telemetry,
};
