//! The per-worker operation loop.

use crate::error::StoreError;
use crate::op_mix::{OpKind, OperationSelector};
use crate::rate_limiter::TokenBucket;
use crate::stats::EngineStats;
use crate::store::Collection;
use crate::telemetry::{FailureEvent, Telemetry};
use bson::doc;
use liveness_generator::synthesizer::fallback_location;
use liveness_generator::DocumentSynthesizer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Golden-ratio increment used to spread per-worker seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// RNG for worker `index`: derived from `seed` when given, else fresh entropy.
pub fn worker_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => {
            let offset = (index as u64).wrapping_add(1).wrapping_mul(SEED_STRIDE);
            StdRng::seed_from_u64(seed.wrapping_add(offset))
        }
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// State shared by every worker of one engine run.
pub(crate) struct WorkerContext {
    pub collection: Arc<dyn Collection>,
    pub limiter: Arc<TokenBucket>,
    pub selector: OperationSelector,
    pub synthesizer: DocumentSynthesizer,
    pub telemetry: Arc<dyn Telemetry>,
    pub stats: Arc<EngineStats>,
    pub cancel: CancellationToken,
    pub failure_pause: Duration,
}

/// One worker loop. Owns its random state exclusively.
pub(crate) struct Worker {
    id: usize,
    rng: StdRng,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub fn new(id: usize, rng: StdRng, ctx: Arc<WorkerContext>) -> Self {
        Self { id, rng, ctx }
    }

    /// Run until the engine stops. Operation failures never end the loop.
    pub async fn run(mut self) {
        debug!("Worker {} started", self.id);

        while !self.ctx.cancel.is_cancelled() {
            if self.ctx.limiter.acquire(1.0).await.is_err() {
                break;
            }

            let kind = self.ctx.selector.select(&mut self.rng);
            match self.execute(kind).await {
                Ok(()) => self.ctx.stats.record_success(kind),
                Err(e) => self.on_failure(kind, e).await,
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    async fn execute(&mut self, kind: OpKind) -> Result<(), StoreError> {
        let k = self.random_key().await?;
        let collection = &self.ctx.collection;

        match kind {
            OpKind::Find => {
                let location = fallback_location(&mut self.rng);
                collection
                    .find_one(doc! { "k": k, "location": location })
                    .await?;
            }
            OpKind::Insert => {
                let document = self
                    .ctx
                    .synthesizer
                    .synthesize(k, &mut self.rng)
                    .to_document()
                    .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
                collection.insert_one(document).await?;
            }
            OpKind::Update => {
                let location = fallback_location(&mut self.rng);
                collection
                    .upsert_increment(
                        doc! { "k": k, "location": location },
                        "n",
                        doc! { "ts": bson::DateTime::now() },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// A key in `[0, estimated_count)`, re-estimated per operation so keys
    /// follow the collection as inserts grow it.
    async fn random_key(&mut self) -> Result<i64, StoreError> {
        let count = self.ctx.collection.estimated_count().await?;
        let upper = i64::try_from(count).unwrap_or(i64::MAX).max(1);
        Ok(self.rng.random_range(0..upper))
    }

    async fn on_failure(&self, kind: OpKind, err: StoreError) {
        self.ctx.stats.record_failure(kind);
        error!(op = %kind, worker = self.id, "Operation failed: {}", err);
        self.ctx
            .telemetry
            .capture_failure(&FailureEvent::operation(kind, &err));

        tokio::select! {
            _ = self.ctx.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.ctx.failure_pause) => {}
        }
    }
}
