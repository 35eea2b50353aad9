//! Retry backoff schedule.

use rand::Rng;
use std::time::Duration;

/// Computes the wait before retry attempt `k`, honoring a caller-supplied
/// interval hint.
///
/// - hint `< 0`: default exponential schedule
///   `min(base · factor^(k-1) + jitter, cap)`
/// - hint `== 0`: retry immediately
/// - hint `> 0`: wait exactly that many milliseconds
///
/// Jitter stays below the schedule's step so successive exponential delays
/// are non-decreasing until the cap.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_ms: u64,
    factor: f64,
    cap_ms: u64,
    jitter_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 600,
            factor: 1.5,
            cap_ms: 5000,
            jitter_ms: 300,
        }
    }
}

impl BackoffPolicy {
    /// Wait duration before retrying attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32, hint_ms: i64) -> Duration {
        if hint_ms > 0 {
            return Duration::from_millis(hint_ms as u64);
        }
        if hint_ms == 0 {
            return Duration::ZERO;
        }
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.exponential_ms(attempt, jitter))
    }

    /// Exponential schedule with an explicit jitter value.
    pub(crate) fn exponential_ms(&self, attempt: u32, jitter_ms: u64) -> u64 {
        let exponent = attempt.saturating_sub(1).min(32);
        let base = self.base_ms as f64 * self.factor.powi(exponent as i32);
        let base = if base >= self.cap_ms as f64 {
            self.cap_ms
        } else {
            base as u64
        };
        base.saturating_add(jitter_ms).min(self.cap_ms)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn exponential_base_sequence() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.exponential_ms(1, 0), 600);
        assert_eq!(policy.exponential_ms(2, 0), 900);
        assert_eq!(policy.exponential_ms(3, 0), 1350);
        assert_eq!(policy.exponential_ms(4, 0), 2025);
    }

    #[test]
    fn schedule_caps_at_five_seconds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.exponential_ms(10, 0), 5000);
        assert_eq!(policy.exponential_ms(10, 299), 5000);
        assert_eq!(policy.exponential_ms(60, 0), 5000);
    }

    #[test]
    fn schedule_is_non_decreasing_under_worst_case_jitter() {
        let policy = BackoffPolicy::default();
        for attempt in 1..12 {
            let worst = policy.exponential_ms(attempt, 299);
            let best_next = policy.exponential_ms(attempt + 1, 0);
            assert!(
                best_next >= worst || best_next == 5000,
                "attempt {attempt}: {worst} then {best_next}"
            );
        }
    }

    #[test]
    fn positive_hint_is_exact() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(3, 1200), Duration::from_millis(1200));
    }

    #[test]
    fn zero_hint_retries_immediately() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1, 0), Duration::ZERO);
    }

    #[test]
    fn negative_hint_uses_bounded_exponential() {
        let policy = BackoffPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay(2, -1).as_millis() as u64;
            assert!((900..900 + 300).contains(&delay), "delay was {delay}");
        }
    }
}
