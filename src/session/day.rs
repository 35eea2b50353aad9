//! Calendar-day marker for day-rollover detection.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Last-known calendar day, compared against the wall clock on every
/// scheduler tick.
///
/// The marker changes at most once per calendar day and never moves
/// backward — a clock that jumps into the past is ignored rather than
/// replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMarker {
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// Day of month (1-31).
    pub day: u32,
}

impl DayMarker {
    /// Marker for the local calendar day right now.
    pub fn today() -> Self {
        Self::from_date(chrono::Local::now().date_naive())
    }

    /// Marker for a specific date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    fn as_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// Advance the marker to `now` if a rollover happened.
    ///
    /// Returns `true` exactly when the marker changed. Calling again on
    /// the same day is a no-op; a date earlier than the marker is refused.
    pub fn roll(&mut self, now: NaiveDate) -> bool {
        let current = match self.as_date() {
            Some(date) => date,
            None => {
                // Corrupt marker (bad persisted data): adopt the clock.
                warn!(marker = ?self, "invalid day marker, resetting");
                *self = Self::from_date(now);
                return true;
            }
        };
        if now == current {
            return false;
        }
        if now < current {
            warn!(marker = %current, clock = %now, "clock moved backward, keeping day marker");
            return false;
        }
        *self = Self::from_date(now);
        info!(day = %now, "day rolled over");
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn same_day_is_a_no_op() {
        let mut marker = DayMarker::from_date(date(2026, 8, 6));
        assert!(!marker.roll(date(2026, 8, 6)));
        assert_eq!(marker, DayMarker::from_date(date(2026, 8, 6)));
    }

    #[test]
    fn rollover_updates_exactly_once() {
        let mut marker = DayMarker::from_date(date(2026, 8, 6));
        assert!(marker.roll(date(2026, 8, 7)));
        // Second check within the new day changes nothing.
        assert!(!marker.roll(date(2026, 8, 7)));
        assert_eq!(marker.day, 7);
    }

    #[test]
    fn marker_never_moves_backward() {
        let mut marker = DayMarker::from_date(date(2026, 8, 6));
        assert!(!marker.roll(date(2026, 8, 5)));
        assert_eq!(marker.day, 6);
    }

    #[test]
    fn rollover_across_month_and_year() {
        let mut marker = DayMarker::from_date(date(2025, 12, 31));
        assert!(marker.roll(date(2026, 1, 1)));
        assert_eq!((marker.year, marker.month, marker.day), (2026, 1, 1));
    }

    #[test]
    fn corrupt_marker_adopts_the_clock() {
        let mut marker = DayMarker {
            year: 2026,
            month: 13,
            day: 40,
        };
        assert!(marker.roll(date(2026, 8, 6)));
        assert_eq!(marker, DayMarker::from_date(date(2026, 8, 6)));
    }

    #[test]
    fn serde_round_trip() {
        let marker = DayMarker::from_date(date(2026, 8, 6));
        let json = serde_json::to_string(&marker).unwrap();
        let back: DayMarker = serde_json::from_str(&json).unwrap();
        assert_eq!(marker, back);
    }
}
