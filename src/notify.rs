//! Notification channel for user-visible engine events.
//!
//! The engine never blocks on these — a [`Notifier`] call is fire-and-
//! forget. The default implementation writes structured log lines; hosts
//! that surface toasts or status text plug in their own implementation or
//! use [`ChannelNotifier`] to drain notices from an mpsc channel.

use crate::signal::EngineStatus;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A user-visible engine event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Sustained failures crossed the threshold; dispatch is suppressed.
    OfflineEntered {
        /// Short description of the failure that tipped the counter.
        detail: String,
    },
    /// A fresh session was established; dispatch resumed.
    OfflineCleared,
    /// The session is invalid; the host should prompt re-authentication.
    ReLoginRequired {
        /// Re-login attempts so far (capped).
        attempt: u32,
    },
    /// A task cycle is starting.
    CycleStarted {
        /// Whether the cycle was alarm-triggered.
        alarm_triggered: bool,
    },
    /// A task cycle completed.
    CycleFinished {
        /// One-line outcome summary from the cycle.
        summary: String,
    },
    /// A task cycle returned an error.
    CycleFailed {
        /// Error description.
        detail: String,
    },
    /// A trigger arrived but no cycle ran.
    CycleSkipped {
        /// Why the trigger was dropped.
        reason: String,
    },
    /// Response to a status query.
    Status(EngineStatus),
}

/// Fire-and-forget sink for [`Notice`] events.
pub trait Notifier: Send + Sync {
    /// Deliver a notice. Must not block.
    fn notice(&self, notice: Notice);
}

/// Default notifier that writes notices as structured log lines.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notice(&self, notice: Notice) {
        match notice {
            Notice::OfflineEntered { detail } => {
                warn!(detail = detail.as_str(), "entered offline mode");
            }
            Notice::OfflineCleared => info!("offline mode cleared"),
            Notice::ReLoginRequired { attempt } => {
                warn!(attempt, "re-login required");
            }
            Notice::CycleStarted { alarm_triggered } => {
                info!(alarm_triggered, "task cycle started");
            }
            Notice::CycleFinished { summary } => {
                info!(summary = summary.as_str(), "task cycle finished");
            }
            Notice::CycleFailed { detail } => {
                warn!(detail = detail.as_str(), "task cycle failed");
            }
            Notice::CycleSkipped { reason } => {
                info!(reason = reason.as_str(), "task cycle skipped");
            }
            Notice::Status(status) => info!(?status, "engine status"),
        }
    }
}

/// Notifier that forwards notices over an unbounded channel.
///
/// Send failures (receiver dropped) are ignored — the engine never blocks
/// or fails on the notification path.
#[derive(Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create a notifier forwarding into `tx`.
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notice(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}
