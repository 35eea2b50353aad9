//! Capped exponential-backoff re-authentication schedule.

use std::time::Duration;

/// Tracks re-login attempts and computes the delay before the next one.
///
/// Early attempts ramp linearly (`(attempt - 1) × step`, so the first
/// fires immediately); once the cap is reached every further attempt
/// waits `max(check_interval, floor)`. The counter resets when a session
/// is successfully re-established.
#[derive(Debug, Clone)]
pub struct ReLoginBackoff {
    attempts: u32,
    max_attempts: u32,
    step: Duration,
    floor: Duration,
}

impl ReLoginBackoff {
    /// Create a schedule with the given cap, linear step, and floor delay.
    pub fn new(max_attempts: u32, step: Duration, floor: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            step,
            floor,
        }
    }

    /// Attempts recorded since the last reset (capped).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record an attempt and return the delay before re-initializing.
    pub fn next_delay(&mut self, check_interval: Duration) -> Duration {
        if self.attempts < self.max_attempts {
            let delay = self.step * self.attempts;
            self.attempts += 1;
            delay
        } else {
            check_interval.max(self.floor)
        }
    }

    /// Reset after a successful re-authentication.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn backoff() -> ReLoginBackoff {
        ReLoginBackoff::new(5, Duration::from_millis(5000), Duration::from_millis(180_000))
    }

    #[test]
    fn early_attempts_ramp_linearly() {
        let mut backoff = backoff();
        let check = Duration::from_millis(60_000);
        let delays: Vec<u64> = (0..5)
            .map(|_| backoff.next_delay(check).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 5000, 10_000, 15_000, 20_000]);
    }

    #[test]
    fn capped_attempts_use_the_floor() {
        let mut backoff = backoff();
        let check = Duration::from_millis(60_000);
        for _ in 0..5 {
            let _ = backoff.next_delay(check);
        }
        // Attempt 6 and beyond: max(check_interval, floor).
        assert_eq!(backoff.next_delay(check), Duration::from_millis(180_000));
        assert_eq!(backoff.next_delay(check), Duration::from_millis(180_000));
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn long_check_interval_wins_over_the_floor() {
        let mut backoff = backoff();
        let check = Duration::from_millis(600_000);
        for _ in 0..5 {
            let _ = backoff.next_delay(check);
        }
        assert_eq!(backoff.next_delay(check), Duration::from_millis(600_000));
    }

    #[test]
    fn delays_are_non_decreasing() {
        let mut backoff = backoff();
        let check = Duration::from_millis(60_000);
        let mut previous = Duration::ZERO;
        for _ in 0..8 {
            let delay = backoff.next_delay(check);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn reset_restarts_the_ramp() {
        let mut backoff = backoff();
        let check = Duration::from_millis(60_000);
        let _ = backoff.next_delay(check);
        let _ = backoff.next_delay(check);
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(check), Duration::ZERO);
    }
}
