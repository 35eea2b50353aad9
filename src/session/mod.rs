//! Session lifecycle: state machine, day rollover, re-login backoff, and
//! the controller that gates task cycles.

pub mod controller;
pub mod day;
pub mod provider;
pub mod relogin;
pub mod status;

pub use controller::{CycleContext, CycleReport, SessionLifecycleController, TaskCycle};
pub use day::DayMarker;
pub use provider::SessionProvider;
pub use relogin::ReLoginBackoff;
pub use status::{JsonStatusStore, PersistedStatus, StatusStore};

use serde::{Deserialize, Serialize};

/// Scheduler state machine.
///
/// `Uninitialized → Initializing → Running ⇄ Offline`, any state
/// `→ Destroyed`. `Offline` here is scheduling-offline (a re-login is
/// pending) — distinct from the network-offline flag owned by the
/// [`OfflineModeController`](crate::offline::OfflineModeController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been established.
    Uninitialized,
    /// Initialization in progress.
    Initializing,
    /// Task cycles may run.
    Running,
    /// Re-login pending; cycles are suppressed.
    Offline,
    /// Torn down; only a forced re-initialization revives the engine.
    Destroyed,
}

impl SessionState {
    /// Whether task cycles may currently be triggered.
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}
