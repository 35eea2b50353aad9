//! Inter-process control signals.
//!
//! External processes steer the engine through a small set of message
//! types; the engine consumes them from an mpsc channel and reports state
//! back through the notification channel. The transport that carries the
//! serialized signals (socket, pipe, broadcast) is not this crate's
//! concern — the types are serde-tagged so any transport can frame them.

use crate::session::{DayMarker, SessionState};
use serde::{Deserialize, Serialize};

/// A control signal consumed by the engine loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineSignal {
    /// Re-initialize the session (force) and run a cycle.
    Restart,
    /// Run a task cycle now.
    Execute {
        /// Whether the trigger came from a timer rather than a
        /// foreground/manual action.
        #[serde(default)]
        alarm_triggered: bool,
    },
    /// Start the re-login flow.
    ReLogin,
    /// Report current engine status through the notification channel.
    StatusQuery,
}

/// Snapshot of engine state reported in response to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Scheduler state machine position.
    pub state: SessionState,
    /// Whether the network-offline flag is set.
    pub network_offline: bool,
    /// Current consecutive-error tally.
    pub consecutive_errors: u32,
    /// Last known calendar day, if a session has been initialized.
    pub day: Option<DayMarker>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn execute_signal_serializes_with_tag() {
        let signal = EngineSignal::Execute {
            alarm_triggered: true,
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("\"type\":\"execute\""));
        assert!(json.contains("\"alarm_triggered\":true"));
    }

    #[test]
    fn execute_signal_alarm_flag_defaults_false() {
        let signal: EngineSignal = serde_json::from_str(r#"{"type":"execute"}"#).unwrap();
        assert_eq!(
            signal,
            EngineSignal::Execute {
                alarm_triggered: false
            }
        );
    }

    #[test]
    fn relogin_signal_round_trips() {
        let json = serde_json::to_string(&EngineSignal::ReLogin).unwrap();
        let back: EngineSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EngineSignal::ReLogin);
    }
}
