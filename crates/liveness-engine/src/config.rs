//! Workload configuration.

use crate::op_mix::OpMix;
use std::time::Duration;

/// Lowest refill rate the engine hands to its rate limiter.
const MIN_OPS_PER_SEC: f64 = 0.1;

/// What the engine runs. Immutable once the engine starts.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub db_name: String,
    pub coll_name: String,
    /// Target collection size reached by preloading; also the key space.
    pub total_docs: u64,
    /// Aggregate operations per second across all workers.
    pub ops_per_sec: f64,
    pub workers: usize,
    pub op_mix: OpMix,
    /// Seed for deterministic worker RNGs; fresh entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            db_name: "liveness".to_string(),
            coll_name: "probe".to_string(),
            total_docs: 1000,
            ops_per_sec: 50.0,
            workers: 4,
            op_mix: OpMix::default(),
            seed: None,
        }
    }
}

impl WorkloadConfig {
    pub fn new(db_name: impl Into<String>, coll_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            coll_name: coll_name.into(),
            ..Default::default()
        }
    }

    pub fn with_total_docs(mut self, total_docs: u64) -> Self {
        self.total_docs = total_docs;
        self
    }

    pub fn with_ops_per_sec(mut self, ops_per_sec: f64) -> Self {
        self.ops_per_sec = ops_per_sec;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_op_mix(mut self, op_mix: OpMix) -> Self {
        self.op_mix = op_mix;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// `(rate, burst)` for the shared token bucket.
    pub fn rate_limit(&self) -> (f64, f64) {
        let ops = if self.ops_per_sec.is_finite() {
            self.ops_per_sec
        } else {
            MIN_OPS_PER_SEC
        };
        (ops.max(MIN_OPS_PER_SEC), ops.max(1.0))
    }
}

/// Engine timings and sizes that rarely need changing.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    pub preload_batch_size: usize,
    /// Pause after a failed operation before the worker continues.
    pub failure_pause: Duration,
    pub probe_interval: Duration,
    /// Upper bound on joining all tasks during `stop()`.
    pub shutdown_timeout: Duration,
    /// Throughput report cadence; `None` disables the reporter.
    pub report_interval: Option<Duration>,
    pub key_index_name: String,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            preload_batch_size: 1000,
            failure_pause: Duration::from_millis(50),
            probe_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
            report_interval: Some(Duration::from_secs(10)),
            key_index_name: "k_1".to_string(),
        }
    }
}
