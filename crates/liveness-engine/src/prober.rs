//! Periodic liveness check, independent of worker traffic.

use crate::stats::EngineStats;
use crate::store::Database;
use crate::telemetry::{FailureEvent, Telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

pub struct HealthProber {
    database: Arc<dyn Database>,
    interval: Duration,
    stats: Arc<EngineStats>,
    telemetry: Arc<dyn Telemetry>,
    cancel: CancellationToken,
}

impl HealthProber {
    pub fn new(
        database: Arc<dyn Database>,
        interval: Duration,
        stats: Arc<EngineStats>,
        telemetry: Arc<dyn Telemetry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            database,
            interval,
            stats,
            telemetry,
            cancel,
        }
    }

    /// Ping once per interval until cancelled. The first ping is immediate.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.database.ping().await {
                Ok(()) => {
                    trace!("Ping ok");
                    self.stats.record_probe(true);
                }
                Err(e) => {
                    error!("Ping failed: {}", e);
                    self.stats.record_probe(false);
                    self.telemetry.capture_failure(&FailureEvent::probe(&e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDatabase, MemoryOp};
    use crate::telemetry::{FailureKind, RecordingTelemetry};

    #[tokio::test(start_paused = true)]
    async fn test_prober_cadence_and_failures() {
        let db = MemoryDatabase::new();
        db.fail_times(MemoryOp::Ping, 2);
        let stats = Arc::new(EngineStats::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let cancel = CancellationToken::new();

        let prober = HealthProber::new(
            Arc::new(db.clone()),
            Duration::from_secs(1),
            stats.clone(),
            telemetry.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(prober.run());

        // Pings at t=0,1,2,3,4.
        tokio::time::sleep(Duration::from_millis(4500)).await;
        cancel.cancel();
        handle.await.unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.probes_failed, 2);
        assert_eq!(snap.probes_ok, 3);
        assert_eq!(db.calls(MemoryOp::Ping), 5);
        assert!(telemetry
            .failures()
            .iter()
            .all(|event| event.kind == FailureKind::Probe));
    }
}
