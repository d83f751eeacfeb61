//! mongodb-liveness: continuous synthetic traffic against a MongoDB cluster.
//!
//! The binary wires the workload crates together:
//!
//! - `liveness-generator` synthesizes documents,
//! - `liveness-engine` runs the rate-limited worker pool and health prober,
//! - `liveness-mongodb` talks to the cluster.
//!
//! This crate holds the CLI surface, `.env` loading, logging setup and the
//! file-backed telemetry sink.

pub mod env;
pub mod logging;
pub mod telemetry;

use clap::Parser;
use liveness_engine::{EngineTuning, OpMix, WorkloadConfig};
use liveness_generator::{Enrichment, Locale, FakerEnrichment};
use liveness_mongodb::MongoArgs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Synthetic traffic generator for MongoDB liveness checks
#[derive(Parser, Clone, Debug)]
#[command(name = "mongodb-liveness")]
#[command(about = "Continuously exercise a MongoDB cluster at a controlled rate")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub mongo: MongoArgs,

    /// Database name
    #[arg(long, env = "MONGO_DB", default_value = "liveness")]
    pub db: String,

    /// Collection name
    #[arg(long, env = "MONGO_COLL", default_value = "probe")]
    pub coll: String,

    /// Target collection size; missing documents are preloaded at startup
    #[arg(long, env = "TOTAL_DOCS", default_value = "1000")]
    pub total_docs: u64,

    /// Aggregate operations per second across all workers
    #[arg(long, env = "OPS_PER_SEC", default_value = "50")]
    pub ops_per_sec: f64,

    /// Number of concurrent workers
    #[arg(
        long,
        env = "WORKERS",
        default_value = "4",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub workers: u16,

    /// Operation mix as kind=weight pairs (e.g., find=70,insert=20,update=10)
    #[arg(long, env = "OP_MIX", default_value = "find=70,insert=20,update=10")]
    pub op_mix: String,

    /// Append failure events as JSON lines to this file
    #[arg(long, env = "TELEMETRY_FILE")]
    pub telemetry_file: Option<PathBuf>,

    /// Write minimal documents only
    #[arg(long, env = "NO_ENRICHMENT")]
    pub no_enrichment: bool,

    /// Locale for enriched documents (en-us, de-de, fr-fr)
    #[arg(long, env = "LOCALE", default_value = "en-us")]
    pub locale: Locale,

    /// Seed for reproducible worker random streams
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Documents per insert_many batch during preload
    #[arg(long, env = "PRELOAD_BATCH_SIZE", default_value = "1000")]
    pub preload_batch_size: usize,

    /// Seconds between throughput reports (0 disables)
    #[arg(long, env = "REPORT_INTERVAL_SECS", default_value = "10")]
    pub report_interval_secs: u64,

    /// Run against an in-memory store instead of the cluster
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn workload_config(&self) -> WorkloadConfig {
        WorkloadConfig::new(&self.db, &self.coll)
            .with_total_docs(self.total_docs)
            .with_ops_per_sec(self.ops_per_sec)
            .with_workers(usize::from(self.workers))
            .with_op_mix(OpMix::parse(&self.op_mix))
            .with_seed(self.seed)
    }

    pub fn engine_tuning(&self) -> EngineTuning {
        EngineTuning {
            preload_batch_size: self.preload_batch_size,
            report_interval: (self.report_interval_secs > 0)
                .then(|| Duration::from_secs(self.report_interval_secs)),
            ..Default::default()
        }
    }

    /// The enrichment capability, unless disabled.
    pub fn enrichment(&self) -> Option<Arc<dyn Enrichment>> {
        if self.no_enrichment {
            None
        } else {
            Some(Arc::new(FakerEnrichment::new(self.locale)))
        }
    }
}
