//! Aggregate throughput limiting shared by all workers.
//!
//! Uses a token bucket that is refilled lazily on every call from the time
//! elapsed since the previous refill; there is no background clock. A caller
//! that finds too few tokens sleeps for the time needed to accumulate the
//! shortfall (clamped to [`MIN_WAIT`]..=[`MAX_WAIT`]) and then re-evaluates.
//! Stopping the bucket wakes every sleeper immediately.

use crate::error::AcquireError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lowest accepted refill rate, in tokens per second.
pub const MIN_RATE: f64 = 0.001;

/// Shortest sleep between re-evaluations.
pub const MIN_WAIT: Duration = Duration::from_millis(1);

/// Longest sleep between re-evaluations.
pub const MAX_WAIT: Duration = Duration::from_secs(1);

/// Token bucket state.
#[derive(Debug)]
struct BucketState {
    /// Current number of tokens available, within `[0, capacity]`.
    tokens: f64,
    /// Last time the bucket was refilled.
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).clamp(0.0, capacity);
        self.last_refill = now;
    }
}

/// Thread-safe token bucket with async, cancellable acquisition.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens added per second.
    rate: f64,
    /// Maximum tokens (burst size).
    capacity: f64,
    state: Mutex<BucketState>,
    stopped: CancellationToken,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// `rate` is clamped to at least [`MIN_RATE`]. When `capacity` is `None`
    /// (or not a positive number) it defaults to `max(1, rate)`.
    pub fn new(rate: f64, capacity: Option<f64>) -> Self {
        Self::with_stop_token(rate, capacity, CancellationToken::new())
    }

    /// Create a full bucket that also stops when `stop` is cancelled.
    pub fn with_stop_token(rate: f64, capacity: Option<f64>, stop: CancellationToken) -> Self {
        let rate = if rate.is_finite() && rate > MIN_RATE {
            rate
        } else {
            MIN_RATE
        };
        let capacity = match capacity {
            Some(c) if c.is_finite() && c > 0.0 => c,
            _ => rate.max(1.0),
        };

        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            stopped: stop,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens currently available, after refilling.
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        state.refill(self.rate, self.capacity);
        state.tokens
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Stop the bucket: pending and future acquisitions fail.
    pub fn stop(&self) {
        self.stopped.cancel();
    }

    /// Take `n` tokens if they are available right now.
    pub fn try_acquire(&self, n: f64) -> Result<bool, AcquireError> {
        if n <= 0.0 {
            return Ok(true);
        }
        self.check_request(n)?;
        Ok(self.take_or_wait(n).is_none())
    }

    /// Wait until `n` tokens are available and take them.
    ///
    /// Returns [`AcquireError::Stopped`] as soon as the bucket is stopped,
    /// including while waiting.
    pub async fn acquire(&self, n: f64) -> Result<(), AcquireError> {
        if n <= 0.0 {
            return Ok(());
        }
        self.check_request(n)?;

        loop {
            let wait = match self.take_or_wait(n) {
                None => return Ok(()),
                Some(wait) => wait,
            };

            tokio::select! {
                biased;
                _ = self.stopped.cancelled() => return Err(AcquireError::Stopped),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn check_request(&self, n: f64) -> Result<(), AcquireError> {
        if self.stopped.is_cancelled() {
            return Err(AcquireError::Stopped);
        }
        if !(n <= self.capacity) {
            return Err(AcquireError::ExceedsCapacity {
                requested: n,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Refill, then either take `n` tokens (`None`) or report how long to wait.
    ///
    /// This is the single critical section of an acquisition attempt.
    fn take_or_wait(&self, n: f64) -> Option<Duration> {
        let mut state = self.lock();
        state.refill(self.rate, self.capacity);

        if state.tokens >= n {
            state.tokens -= n;
            return None;
        }

        let need = (n - state.tokens) / self.rate;
        let wait = Duration::try_from_secs_f64(need).map_or(MAX_WAIT, |d| d.min(MAX_WAIT));
        Some(wait.max(MIN_WAIT))
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
