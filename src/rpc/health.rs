//! Per-method call statistics and quarantine windows.
//!
//! Certain error codes mean the remote application has throttled a
//! specific method; calling it again before the window lapses only makes
//! things worse. The bridge records every outcome here and refuses
//! quarantined methods without network I/O.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Call counters for one method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodStats {
    /// Total recorded calls.
    pub total_calls: u64,
    /// Calls that completed without an error shape.
    pub success_calls: u64,
    /// Calls that failed (error-shaped, unresponsive, or declined).
    pub failure_calls: u64,
    /// When the method was last called.
    pub last_call: Option<Instant>,
    /// When the method last succeeded.
    pub last_success: Option<Instant>,
}

#[derive(Debug, Default)]
struct MethodEntry {
    stats: MethodStats,
    suspended_until: Option<Instant>,
}

/// Tracks per-method health and quarantine state.
#[derive(Debug)]
pub struct MethodHealth {
    entries: Mutex<HashMap<String, MethodEntry>>,
    quarantine_codes: HashSet<String>,
    quarantine_duration: Duration,
}

impl MethodHealth {
    /// Create a tracker that quarantines methods failing with one of
    /// `codes` for `duration`.
    pub fn new(codes: &[String], duration: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quarantine_codes: codes.iter().cloned().collect(),
            quarantine_duration: duration,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, method: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(method.to_owned()).or_default();
        let now = Instant::now();
        entry.stats.total_calls += 1;
        entry.stats.success_calls += 1;
        entry.stats.last_call = Some(now);
        entry.stats.last_success = Some(now);
    }

    /// Record a failed call; a quarantine-coded failure suspends the method.
    pub fn record_failure(&self, method: &str, code: Option<&str>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(method.to_owned()).or_default();
        entry.stats.total_calls += 1;
        entry.stats.failure_calls += 1;
        entry.stats.last_call = Some(Instant::now());
        if let Some(code) = code {
            if self.quarantine_codes.contains(code) {
                entry.suspended_until = Some(Instant::now() + self.quarantine_duration);
                warn!(
                    method,
                    code,
                    duration_ms = self.quarantine_duration.as_millis() as u64,
                    "method quarantined"
                );
            }
        }
    }

    /// Whether the method is currently quarantined. Lapsed windows are
    /// cleared on the way out.
    pub fn is_suspended(&self, method: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(method) else {
            return false;
        };
        match entry.suspended_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                entry.suspended_until = None;
                debug!(method, "quarantine window lapsed");
                false
            }
            None => false,
        }
    }

    /// Counters for one method, if it has been called.
    pub fn stats(&self, method: &str) -> Option<MethodStats> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .map(|e| e.stats)
    }

    /// Drop all stats and quarantine windows (session teardown).
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn health(duration_ms: u64) -> MethodHealth {
        MethodHealth::new(&["1009".to_owned()], Duration::from_millis(duration_ms))
    }

    #[test]
    fn stats_count_successes_and_failures() {
        let health = health(1000);
        health.record_success("m");
        health.record_failure("m", None);
        health.record_failure("m", Some("9999"));

        let stats = health.stats("m").unwrap();
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.success_calls, 1);
        assert_eq!(stats.failure_calls, 2);
        assert!(stats.last_call.is_some());
        assert!(stats.last_success.is_some());
    }

    #[test]
    fn quarantine_code_suspends_only_that_method() {
        let health = health(60_000);
        health.record_failure("hot", Some("1009"));
        assert!(health.is_suspended("hot"));
        assert!(!health.is_suspended("other"));
    }

    #[test]
    fn non_quarantine_code_does_not_suspend() {
        let health = health(60_000);
        health.record_failure("m", Some("1004"));
        assert!(!health.is_suspended("m"));
    }

    #[tokio::test]
    async fn quarantine_window_lapses() {
        let health = health(20);
        health.record_failure("m", Some("1009"));
        assert!(health.is_suspended("m"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!health.is_suspended("m"));
    }

    #[test]
    fn clear_drops_everything() {
        let health = health(60_000);
        health.record_failure("m", Some("1009"));
        health.clear();
        assert!(!health.is_suspended("m"));
        assert!(health.stats("m").is_none());
    }
}
