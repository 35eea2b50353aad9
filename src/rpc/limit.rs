//! Per-method rate limiting.
//!
//! The bridge consults the limiter before every attempt; a slot is granted
//! once the method's minimum interval has elapsed since its last call.
//! Waiting happens on the calling task, never under the lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Grants call slots per method according to a pacing policy.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Block the calling task until `method` may be called again.
    async fn await_slot(&self, method: &str);

    /// Drop all pacing state (session teardown).
    fn reset(&self) {}
}

/// Minimum-interval limiter: each method may be called at most once per
/// configured interval, with a shared default for unconfigured methods.
#[derive(Debug)]
pub struct IntervalRateLimiter {
    default_interval: Duration,
    intervals: Mutex<HashMap<String, Duration>>,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl IntervalRateLimiter {
    /// Create a limiter with the given default minimum interval.
    pub fn new(default_interval: Duration) -> Self {
        Self {
            default_interval,
            intervals: Mutex::new(HashMap::new()),
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Override the minimum interval for one method.
    pub fn set_interval(&self, method: impl Into<String>, interval: Duration) {
        self.intervals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.into(), interval);
    }

    fn interval_for(&self, method: &str) -> Duration {
        self.intervals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(self.default_interval)
    }
}

#[async_trait]
impl RateLimiter for IntervalRateLimiter {
    async fn await_slot(&self, method: &str) {
        let interval = self.interval_for(method);
        // Compute the remaining wait under the lock, sleep outside it.
        let wait = {
            let last = self
                .last_call
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            last.get(method)
                .and_then(|at| interval.checked_sub(at.elapsed()))
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
        self.last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_owned(), Instant::now());
    }

    fn reset(&self) {
        self.last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn first_call_is_immediate() {
        let limiter = IntervalRateLimiter::new(Duration::from_millis(200));
        let start = Instant::now();
        limiter.await_slot("m").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn second_call_waits_out_the_interval() {
        let limiter = IntervalRateLimiter::new(Duration::from_millis(80));
        limiter.await_slot("m").await;
        let start = Instant::now();
        limiter.await_slot("m").await;
        assert!(start.elapsed() >= Duration::from_millis(70));
    }

    #[tokio::test]
    async fn methods_are_paced_independently() {
        let limiter = IntervalRateLimiter::new(Duration::from_millis(200));
        limiter.await_slot("a").await;
        let start = Instant::now();
        limiter.await_slot("b").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn per_method_override_applies() {
        let limiter = IntervalRateLimiter::new(Duration::from_millis(500));
        limiter.set_interval("fast", Duration::from_millis(10));
        limiter.await_slot("fast").await;
        let start = Instant::now();
        limiter.await_slot("fast").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn reset_forgets_pacing_state() {
        let limiter = IntervalRateLimiter::new(Duration::from_millis(500));
        limiter.await_slot("m").await;
        limiter.reset();
        let start = Instant::now();
        limiter.await_slot("m").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
