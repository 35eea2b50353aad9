//! Offline-mode escalation.
//!
//! Sustained transient failures mean the backend (or the device's
//! connectivity) is unhealthy; continuing to dispatch only burns quota and
//! battery. The controller tallies consecutive classified failures and
//! flips a shared offline flag once they reach the configured threshold.
//! While the flag is set the bridge refuses new dispatch; pending calls
//! run to completion.

use crate::config::OfflineConfig;
use crate::notify::{Notice, Notifier};
use crate::signal::EngineSignal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Tracks consecutive classified errors and the shared offline flag.
pub struct OfflineModeController {
    consecutive_errors: AtomicU32,
    offline: AtomicBool,
    threshold: u32,
    relogin_on_error: bool,
    notifier: Arc<dyn Notifier>,
    signal_tx: mpsc::UnboundedSender<EngineSignal>,
}

impl OfflineModeController {
    /// Create a controller emitting notices through `notifier` and
    /// re-login requests through `signal_tx`.
    pub fn new(
        config: &OfflineConfig,
        notifier: Arc<dyn Notifier>,
        signal_tx: mpsc::UnboundedSender<EngineSignal>,
    ) -> Self {
        Self {
            consecutive_errors: AtomicU32::new(0),
            offline: AtomicBool::new(false),
            threshold: config.error_threshold,
            relogin_on_error: config.relogin_on_error,
            notifier,
            signal_tx,
        }
    }

    /// Whether new dispatch is currently suppressed.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Current consecutive-error tally.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::SeqCst)
    }

    /// Record a classified transient failure. Returns the new tally.
    ///
    /// The flag flips exactly when the tally reaches the threshold; the
    /// user-visible notice fires once per transition.
    pub fn on_transient_error(&self, method: &str, detail: &str) -> u32 {
        let was_offline = self.is_offline();
        let count = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(method, detail, count, threshold = self.threshold, "transient error");
        if !was_offline {
            if count >= self.threshold && !self.offline.swap(true, Ordering::SeqCst) {
                warn!(count, "error threshold reached, entering offline mode");
                self.notifier.notice(Notice::OfflineEntered {
                    detail: format!("{method}: {detail}"),
                });
            }
            if self.relogin_on_error {
                let _ = self.signal_tx.send(EngineSignal::ReLogin);
            }
        }
        count
    }

    /// Record a session-terminating failure: counts like a transient
    /// error, and always requests the re-login flow.
    pub fn on_session_error(&self, method: &str, detail: &str) {
        let was_offline = self.is_offline();
        let _ = self.on_transient_error(method, detail);
        // on_transient_error may already have requested re-login.
        if !(self.relogin_on_error && !was_offline) {
            let _ = self.signal_tx.send(EngineSignal::ReLogin);
        }
    }

    /// Record a successful call; the tally resets regardless of its value.
    pub fn on_success(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
    }

    /// Clear the offline flag once a fresh session is established.
    pub fn clear_offline(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
        if self.offline.swap(false, Ordering::SeqCst) {
            debug!("offline flag cleared");
            self.notifier.notice(Notice::OfflineCleared);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::notify::ChannelNotifier;

    fn controller(
        threshold: u32,
        relogin_on_error: bool,
    ) -> (
        OfflineModeController,
        mpsc::UnboundedReceiver<Notice>,
        mpsc::UnboundedReceiver<EngineSignal>,
    ) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let config = OfflineConfig {
            error_threshold: threshold,
            relogin_on_error,
        };
        let controller = OfflineModeController::new(
            &config,
            Arc::new(ChannelNotifier::new(notice_tx)),
            signal_tx,
        );
        (controller, notice_rx, signal_rx)
    }

    #[test]
    fn flag_flips_exactly_at_the_threshold() {
        let (controller, mut notices, _signals) = controller(3, false);

        assert_eq!(controller.on_transient_error("m", "busy"), 1);
        assert!(!controller.is_offline());
        assert_eq!(controller.on_transient_error("m", "busy"), 2);
        assert!(!controller.is_offline());
        assert_eq!(controller.on_transient_error("m", "busy"), 3);
        assert!(controller.is_offline());

        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::OfflineEntered { .. }
        ));
        // Only one transition notice, even as errors keep arriving.
        let _ = controller.on_transient_error("m", "busy");
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn success_resets_the_tally() {
        let (controller, _notices, _signals) = controller(5, false);
        let _ = controller.on_transient_error("m", "busy");
        let _ = controller.on_transient_error("m", "busy");
        controller.on_success();
        assert_eq!(controller.consecutive_errors(), 0);
        // The threshold starts over.
        assert_eq!(controller.on_transient_error("m", "busy"), 1);
        assert!(!controller.is_offline());
    }

    #[test]
    fn clear_offline_resets_flag_and_tally() {
        let (controller, mut notices, _signals) = controller(1, false);
        let _ = controller.on_transient_error("m", "busy");
        assert!(controller.is_offline());
        let _ = notices.try_recv();

        controller.clear_offline();
        assert!(!controller.is_offline());
        assert_eq!(controller.consecutive_errors(), 0);
        assert_eq!(notices.try_recv().unwrap(), Notice::OfflineCleared);
    }

    #[test]
    fn relogin_requested_when_configured() {
        let (controller, _notices, mut signals) = controller(10, true);
        let _ = controller.on_transient_error("m", "busy");
        assert_eq!(signals.try_recv().unwrap(), EngineSignal::ReLogin);
    }

    #[test]
    fn session_error_always_requests_relogin() {
        let (controller, _notices, mut signals) = controller(10, false);
        controller.on_session_error("m", "session expired");
        assert_eq!(signals.try_recv().unwrap(), EngineSignal::ReLogin);
        assert_eq!(controller.consecutive_errors(), 1);
    }

    #[test]
    fn no_duplicate_relogin_request_per_session_error() {
        let (controller, _notices, mut signals) = controller(10, true);
        controller.on_session_error("m", "session expired");
        assert_eq!(signals.try_recv().unwrap(), EngineSignal::ReLogin);
        assert!(signals.try_recv().is_err());
    }
}
