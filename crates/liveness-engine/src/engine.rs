//! Workload engine: lifecycle, preload and task orchestration.

use crate::config::{EngineTuning, WorkloadConfig};
use crate::error::EngineError;
use crate::op_mix::OperationSelector;
use crate::prober::HealthProber;
use crate::rate_limiter::TokenBucket;
use crate::stats::{run_reporter, EngineStats, StatsSnapshot};
use crate::store::{Collection, Database};
use crate::telemetry::{FailureEvent, NoopTelemetry, SetupStage, Telemetry};
use crate::worker::{worker_rng, Worker, WorkerContext};
use bson::Document;
use liveness_generator::{DocumentSynthesizer, Enrichment};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Lifecycle of a [`WorkloadEngine`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Preparing,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Preparing => "preparing",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Owns the worker pool, the prober and the shared rate limiter.
pub struct WorkloadEngine {
    config: WorkloadConfig,
    tuning: EngineTuning,
    database: Arc<dyn Database>,
    synthesizer: DocumentSynthesizer,
    telemetry: Arc<dyn Telemetry>,
    stats: Arc<EngineStats>,
    state: watch::Sender<EngineState>,
    cancel: CancellationToken,
    limiter: Option<Arc<TokenBucket>>,
    tasks: Vec<(String, JoinHandle<()>)>,
    started_at: Option<Instant>,
}

impl WorkloadEngine {
    /// Create an idle engine with minimal documents and no telemetry.
    pub fn new(config: WorkloadConfig, database: Arc<dyn Database>) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        Self {
            config,
            tuning: EngineTuning::default(),
            database,
            synthesizer: DocumentSynthesizer::minimal(),
            telemetry: Arc::new(NoopTelemetry),
            stats: Arc::new(EngineStats::new()),
            state,
            cancel: CancellationToken::new(),
            limiter: None,
            tasks: Vec::new(),
            started_at: None,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Arc<dyn Enrichment>) -> Self {
        self.synthesizer = DocumentSynthesizer::new(enrichment);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_tuning(mut self, tuning: EngineTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Prepare the collection, then spawn the workers and the prober.
    ///
    /// Setup failures are logged and reported but never fail the call; the
    /// only error is calling `start` on an engine that is not idle.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        let current = self.state();
        if current != EngineState::Idle {
            return Err(EngineError::InvalidTransition {
                action: "start",
                state: current,
            });
        }
        self.set_state(EngineState::Preparing);

        let collection = self
            .database
            .collection(&self.config.db_name, &self.config.coll_name);
        self.prepare(collection.as_ref()).await;

        let (rate, burst) = self.config.rate_limit();
        let limiter = Arc::new(TokenBucket::with_stop_token(
            rate,
            Some(burst),
            self.cancel.child_token(),
        ));
        self.limiter = Some(limiter.clone());

        let ctx = Arc::new(WorkerContext {
            collection,
            limiter,
            selector: OperationSelector::new(&self.config.op_mix),
            synthesizer: self.synthesizer.clone(),
            telemetry: self.telemetry.clone(),
            stats: self.stats.clone(),
            cancel: self.cancel.clone(),
            failure_pause: self.tuning.failure_pause,
        });

        self.set_state(EngineState::Running);
        self.started_at = Some(Instant::now());

        if self.config.workers == 0 {
            warn!("Worker count is 0; only the prober will run");
        }
        info!(
            "Starting {} workers at {:.1} ops/s (burst {:.0}, mix {})",
            self.config.workers, rate, burst, self.config.op_mix
        );
        for id in 0..self.config.workers {
            let worker = Worker::new(id, worker_rng(self.config.seed, id), ctx.clone());
            let handle = tokio::spawn(worker.run().instrument(info_span!("worker", id)));
            self.tasks.push((format!("worker-{id}"), handle));
        }

        let prober = HealthProber::new(
            self.database.clone(),
            self.tuning.probe_interval,
            self.stats.clone(),
            self.telemetry.clone(),
            self.cancel.clone(),
        );
        let handle = tokio::spawn(prober.run().instrument(info_span!("prober")));
        self.tasks.push(("prober".to_string(), handle));
        info!("Prober started (interval {:?})", self.tuning.probe_interval);

        if let Some(interval) = self.tuning.report_interval.filter(|i| !i.is_zero()) {
            let handle = tokio::spawn(
                run_reporter(self.stats.clone(), interval, self.cancel.clone())
                    .instrument(info_span!("reporter")),
            );
            self.tasks.push(("reporter".to_string(), handle));
        }

        Ok(())
    }

    /// Signal every task to stop and join them against one deadline.
    ///
    /// Tasks still running at the deadline are aborted. Calling `stop` again
    /// is a no-op; stopping an idle engine goes straight to `Stopped`.
    pub async fn stop(&mut self) {
        match self.state() {
            EngineState::Stopping | EngineState::Stopped => return,
            EngineState::Idle => {
                self.cancel.cancel();
                self.set_state(EngineState::Stopped);
                return;
            }
            EngineState::Preparing | EngineState::Running => {}
        }

        self.set_state(EngineState::Stopping);
        info!("Stopping workload ({} tasks)", self.tasks.len());

        self.cancel.cancel();
        if let Some(limiter) = &self.limiter {
            limiter.stop();
        }

        let deadline = Instant::now() + self.tuning.shutdown_timeout;
        for (name, mut handle) in self.tasks.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!("{} joined", name),
                Ok(Err(e)) => warn!("{} ended abnormally: {}", name, e),
                Err(_) => {
                    warn!("{} did not stop before the shutdown deadline; aborting", name);
                    handle.abort();
                }
            }
        }

        let elapsed = self
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();
        info!(
            "Workload stopped after {:.1}s: {}",
            elapsed.as_secs_f64(),
            self.stats.snapshot().summary(elapsed)
        );
        self.set_state(EngineState::Stopped);
    }

    fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
    }

    /// Ensure the key index and preload up to `total_docs`. Best effort.
    async fn prepare(&self, collection: &dyn Collection) {
        let namespace = collection.namespace();

        if let Err(e) = collection
            .ensure_index("k", &self.tuning.key_index_name)
            .await
        {
            self.report_setup_failure(SetupStage::EnsureIndex, &e);
        }

        let existing = match collection.estimated_count().await {
            Ok(count) => count,
            Err(e) => {
                self.report_setup_failure(SetupStage::CountDocuments, &e);
                warn!("Skipping preload of {}: document count unavailable", namespace);
                return;
            }
        };

        let target = self.config.total_docs;
        if existing >= target {
            info!(
                "Dataset already sized: existing={} target={}",
                existing, target
            );
            return;
        }

        let deficit = target - existing;
        let batch_size = self.tuning.preload_batch_size.max(1) as u64;
        info!(
            "Preloading {}: inserting {} docs (existing={} target={}, batch size {})",
            namespace, deficit, existing, target, batch_size
        );

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let mut inserted = 0u64;
        let mut batch_no = 0u64;
        let mut next = existing;
        while next < target {
            let end = (next + batch_size).min(target);
            batch_no += 1;

            let docs: Vec<Document> = (next..end)
                .filter_map(|k| {
                    let k = i64::try_from(k).ok()?;
                    match self.synthesizer.synthesize(k, &mut rng).to_document() {
                        Ok(doc) => Some(doc),
                        Err(e) => {
                            warn!("Skipping preload document k={}: {}", k, e);
                            None
                        }
                    }
                })
                .collect();
            next = end;

            match collection.insert_many(docs).await {
                Ok(count) => {
                    inserted += count;
                    self.stats.record_preloaded(count);
                    debug!("Preload batch {} inserted {} docs", batch_no, count);
                }
                Err(e) => {
                    self.report_setup_failure(SetupStage::PreloadBatch { batch: batch_no }, &e);
                }
            }
        }

        info!(
            "Preload complete: {} of {} docs inserted in {} batches",
            inserted, deficit, batch_no
        );
    }

    fn report_setup_failure(&self, stage: SetupStage, err: &(dyn std::error::Error + 'static)) {
        warn!(stage = %stage, "Setup step failed: {}", err);
        self.telemetry
            .capture_failure(&FailureEvent::setup(stage, err));
    }
}

impl Drop for WorkloadEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;

    #[test]
    fn test_state_display() {
        assert_eq!(EngineState::Idle.to_string(), "idle");
        assert_eq!(EngineState::Stopping.to_string(), "stopping");
    }

    #[tokio::test]
    async fn test_stop_idle_engine() {
        let mut engine = WorkloadEngine::new(
            WorkloadConfig::default(),
            Arc::new(MemoryDatabase::new()),
        );

        engine.stop().await;
        assert_eq!(engine.state(), EngineState::Stopped);

        let err = engine.start().await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTransition {
                action: "start",
                state: EngineState::Stopped,
            }
        );
    }

    #[tokio::test]
    async fn test_state_watch_sees_transitions() {
        let db = MemoryDatabase::new();
        let mut engine = WorkloadEngine::new(
            WorkloadConfig::default().with_total_docs(0).with_workers(1),
            Arc::new(db),
        );
        let mut rx = engine.subscribe_state();
        assert_eq!(*rx.borrow_and_update(), EngineState::Idle);

        engine.start().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), EngineState::Running);

        engine.stop().await;
        assert_eq!(*rx.borrow_and_update(), EngineState::Stopped);
    }
}
