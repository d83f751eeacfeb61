//! Run statistics and the periodic throughput reporter.

use crate::op_mix::OpKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Lock-free counters shared by workers, the prober and the engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    ops: [AtomicU64; 3],
    failures: [AtomicU64; 3],
    probes_ok: AtomicU64,
    probes_failed: AtomicU64,
    preloaded: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, kind: OpKind) {
        self.ops[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: OpKind) {
        self.failures[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe(&self, ok: bool) {
        let counter = if ok {
            &self.probes_ok
        } else {
            &self.probes_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preloaded(&self, count: u64) {
        self.preloaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counters: &[AtomicU64; 3]| {
            [
                counters[0].load(Ordering::Relaxed),
                counters[1].load(Ordering::Relaxed),
                counters[2].load(Ordering::Relaxed),
            ]
        };
        StatsSnapshot {
            ops: load(&self.ops),
            failures: load(&self.failures),
            probes_ok: self.probes_ok.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            preloaded: self.preloaded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    ops: [u64; 3],
    failures: [u64; 3],
    pub probes_ok: u64,
    pub probes_failed: u64,
    /// Documents inserted by the preload phase.
    pub preloaded: u64,
}

impl StatsSnapshot {
    /// Successful operations of `kind`.
    pub fn succeeded(&self, kind: OpKind) -> u64 {
        self.ops[kind.index()]
    }

    /// Failed operations of `kind`.
    pub fn failed(&self, kind: OpKind) -> u64 {
        self.failures[kind.index()]
    }

    pub fn total_succeeded(&self) -> u64 {
        self.ops.iter().sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.failures.iter().sum()
    }

    /// Operations attempted, successful or not.
    pub fn total_attempted(&self) -> u64 {
        self.total_succeeded() + self.total_failed()
    }

    /// Operations per second over `elapsed`.
    pub fn ops_per_second(&self, elapsed: Duration) -> f64 {
        if elapsed.as_secs_f64() > 0.0 {
            self.total_attempted() as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Counters accumulated since `earlier`.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        let diff = |a: [u64; 3], b: [u64; 3]| {
            [
                a[0].saturating_sub(b[0]),
                a[1].saturating_sub(b[1]),
                a[2].saturating_sub(b[2]),
            ]
        };
        StatsSnapshot {
            ops: diff(self.ops, earlier.ops),
            failures: diff(self.failures, earlier.failures),
            probes_ok: self.probes_ok.saturating_sub(earlier.probes_ok),
            probes_failed: self.probes_failed.saturating_sub(earlier.probes_failed),
            preloaded: self.preloaded.saturating_sub(earlier.preloaded),
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self, elapsed: Duration) -> String {
        format!(
            "{:.1} ops/s (find={}, insert={}, update={}, failures={}, probes ok/failed={}/{})",
            self.ops_per_second(elapsed),
            self.succeeded(OpKind::Find),
            self.succeeded(OpKind::Insert),
            self.succeeded(OpKind::Update),
            self.total_failed(),
            self.probes_ok,
            self.probes_failed,
        )
    }
}

/// Log throughput every `interval` until `cancel` fires.
pub async fn run_reporter(stats: Arc<EngineStats>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut previous = stats.snapshot();
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let current = stats.snapshot();
                let now = Instant::now();
                let window = current.since(&previous);
                info!("Throughput: {}", window.summary(now - last));
                previous = current;
                last = now;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = EngineStats::new();
        stats.record_success(OpKind::Find);
        stats.record_success(OpKind::Find);
        stats.record_success(OpKind::Update);
        stats.record_failure(OpKind::Insert);
        stats.record_probe(true);
        stats.record_probe(false);
        stats.record_preloaded(100);

        let snap = stats.snapshot();
        assert_eq!(snap.succeeded(OpKind::Find), 2);
        assert_eq!(snap.succeeded(OpKind::Insert), 0);
        assert_eq!(snap.failed(OpKind::Insert), 1);
        assert_eq!(snap.total_attempted(), 4);
        assert_eq!(snap.probes_ok, 1);
        assert_eq!(snap.probes_failed, 1);
        assert_eq!(snap.preloaded, 100);
    }

    #[test]
    fn test_since_and_rate() {
        let stats = EngineStats::new();
        stats.record_success(OpKind::Find);
        let before = stats.snapshot();

        for _ in 0..10 {
            stats.record_success(OpKind::Insert);
        }
        let window = stats.snapshot().since(&before);

        assert_eq!(window.total_succeeded(), 10);
        assert_eq!(window.ops_per_second(Duration::from_secs(2)), 5.0);
        assert_eq!(window.ops_per_second(Duration::ZERO), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops_on_cancel() {
        let stats = Arc::new(EngineStats::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_reporter(
            stats.clone(),
            Duration::from_secs(1),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
