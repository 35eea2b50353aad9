//! Session lifecycle controller.
//!
//! Owns the state machine that gates task execution: initialization and
//! teardown, trigger gating (alarm vs manual), session-identity checks,
//! day rollover, re-login scheduling, and the inactivity watchdog. Task
//! cycles are single-flight at this level — a trigger arriving while a
//! cycle is running is dropped, not queued.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::notify::{Notice, Notifier};
use crate::offline::OfflineModeController;
use crate::rpc::bridge::RpcBridge;
use crate::session::SessionState;
use crate::session::day::DayMarker;
use crate::session::provider::SessionProvider;
use crate::session::relogin::ReLoginBackoff;
use crate::session::status::{PersistedStatus, StatusStore};
use crate::signal::{EngineSignal, EngineStatus};
use async_trait::async_trait;
use chrono::Timelike;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything a task cycle needs for one run.
pub struct CycleContext {
    /// Session the cycle runs under.
    pub session_id: String,
    /// Whether the trigger came from a timer.
    pub alarm_triggered: bool,
    /// Bridge for issuing remote calls.
    pub bridge: Arc<RpcBridge>,
    stop: Arc<AtomicBool>,
}

impl CycleContext {
    /// Cooperative stop flag: set when the engine wants in-flight task
    /// work to wind down. Long cycles should check it between steps.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Outcome summary returned by a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// One-line summary surfaced through the notification channel.
    pub summary: String,
}

impl CycleReport {
    /// Build a report with the given summary.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

/// One run of the scheduled automation logic.
#[async_trait]
pub trait TaskCycle: Send + Sync {
    /// Execute the cycle. Remote calls go through `ctx.bridge`.
    async fn run(&self, ctx: CycleContext) -> Result<CycleReport>;
}

/// The scheduler state machine plus everything it gates.
pub struct SessionLifecycleController {
    config: EngineConfig,
    state: Mutex<SessionState>,
    /// Serializes initialize/destroy against each other.
    init_lock: tokio::sync::Mutex<()>,
    /// Single-flight guard for task cycles.
    cycle_lock: tokio::sync::Mutex<()>,
    session_id: Mutex<Option<String>>,
    day: Mutex<Option<DayMarker>>,
    relogin: Mutex<ReLoginBackoff>,
    first_run_done: AtomicBool,
    stop_flag: Arc<AtomicBool>,
    last_cycle: Mutex<Option<(Instant, chrono::NaiveDate)>>,
    bridge: Arc<RpcBridge>,
    offline: Arc<OfflineModeController>,
    provider: Arc<dyn SessionProvider>,
    store: Arc<dyn StatusStore>,
    cycle: Arc<dyn TaskCycle>,
    notifier: Arc<dyn Notifier>,
    signal_tx: mpsc::UnboundedSender<EngineSignal>,
}

impl SessionLifecycleController {
    /// Wire a controller from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        bridge: Arc<RpcBridge>,
        offline: Arc<OfflineModeController>,
        provider: Arc<dyn SessionProvider>,
        store: Arc<dyn StatusStore>,
        cycle: Arc<dyn TaskCycle>,
        notifier: Arc<dyn Notifier>,
        signal_tx: mpsc::UnboundedSender<EngineSignal>,
    ) -> Self {
        let relogin = ReLoginBackoff::new(
            config.scheduler.relogin_max_attempts,
            Duration::from_millis(config.scheduler.relogin_step_ms),
            Duration::from_millis(config.scheduler.relogin_floor_ms),
        );
        Self {
            config,
            state: Mutex::new(SessionState::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            cycle_lock: tokio::sync::Mutex::new(()),
            session_id: Mutex::new(None),
            day: Mutex::new(None),
            relogin: Mutex::new(relogin),
            first_run_done: AtomicBool::new(false),
            stop_flag: Arc::new(AtomicBool::new(false)),
            last_cycle: Mutex::new(None),
            bridge,
            offline,
            provider,
            store,
            cycle,
            notifier,
            signal_tx,
        }
    }

    /// Current state machine position.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Session the controller is currently operating under.
    pub fn active_session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot for status queries.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state(),
            network_offline: self.offline.is_offline(),
            consecutive_errors: self.offline.consecutive_errors(),
            day: *self.day.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Establish (or re-establish) the session.
    ///
    /// Already `Running` and not forced is a no-op success. Without a
    /// session identity this fails and leaves the state unchanged.
    /// Otherwise the bridge is armed, persisted status loaded, the day
    /// marker recorded, and offline/error state cleared.
    pub async fn initialize(&self, force: bool) -> bool {
        let _init = self.init_lock.lock().await;

        let previous = self.state();
        if previous == SessionState::Running && !force {
            return true;
        }
        if previous == SessionState::Destroyed && !force {
            debug!("initialize skipped, engine destroyed");
            return false;
        }
        self.set_state(SessionState::Initializing);

        let Some(session_id) = self.provider.current_session_id() else {
            warn!("initialize: no session available");
            self.set_state(previous);
            return false;
        };

        let mut persisted = match self.store.load(&session_id) {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "cannot load persisted status, starting fresh");
                PersistedStatus::empty(&session_id)
            }
        };

        if let Err(e) = self.bridge.load() {
            warn!(error = %e, "cannot arm bridge");
            self.set_state(previous);
            return false;
        }

        let today = chrono::Local::now().date_naive();
        let mut marker = persisted
            .day
            .unwrap_or_else(|| DayMarker::from_date(today));
        let _ = marker.roll(today);
        persisted.day = Some(marker);
        if let Err(e) = self.store.save(&persisted) {
            warn!(error = %e, "cannot persist status");
        }

        *self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session_id.clone());
        *self.day.lock().unwrap_or_else(PoisonError::into_inner) = Some(marker);

        self.offline.clear_offline();
        self.relogin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        self.first_run_done.store(false, Ordering::SeqCst);
        self.stop_flag.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Running);
        info!(session_id = session_id.as_str(), "session initialized");
        true
    }

    /// Tear down.
    ///
    /// Forced: stop cycle work, release the bridge, clear session-scoped
    /// state, transition to `Destroyed`. Not forced: only ask in-flight
    /// task work to wind down, keeping session state for a later trigger.
    pub async fn destroy(&self, force: bool) {
        let _init = self.init_lock.lock().await;

        self.stop_flag.store(true, Ordering::SeqCst);
        if !force {
            debug!("stopping in-flight task work");
            return;
        }

        self.bridge.unload();
        self.bridge.reset_session_state();
        *self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self.day.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .last_cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.relogin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        self.first_run_done.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Destroyed);
        info!("session destroyed");
    }

    /// Handle a trigger (timer tick, foreground event, or signal).
    ///
    /// Gates, in order: state must be `Running`; a session must be
    /// configured; a manual trigger after the first run needs the
    /// auto-schedule flag; the session identity must be unchanged (a
    /// mismatch starts the re-login flow instead); then the day marker is
    /// rolled and the cycle runs — single-flight, drops on contention.
    pub async fn execute_trigger(&self, alarm_triggered: bool) {
        let state = self.state();
        if !state.is_running() {
            debug!(state = ?state, "trigger skipped, engine not running");
            return;
        }
        let Some(active) = self.active_session_id() else {
            debug!("trigger skipped, no session configuration");
            return;
        };

        if !alarm_triggered
            && self.first_run_done.load(Ordering::SeqCst)
            && !self.config.scheduler.auto_schedule_on_manual_trigger
        {
            debug!("manual trigger skipped, auto-schedule disabled");
            self.notifier.notice(Notice::CycleSkipped {
                reason: "manual trigger with auto-schedule disabled".to_owned(),
            });
            return;
        }

        let current = self.provider.current_authenticated_session_id();
        if current.as_deref() != Some(active.as_str()) {
            warn!(
                expected = active.as_str(),
                current = current.as_deref().unwrap_or("<none>"),
                "session identity changed, starting re-login"
            );
            self.relogin().await;
            return;
        }

        let today = chrono::Local::now().date_naive();
        let rolled = {
            let mut day = self.day.lock().unwrap_or_else(PoisonError::into_inner);
            match day.as_mut() {
                Some(marker) => marker.roll(today),
                None => false,
            }
        };
        if rolled {
            self.persist_day(&active);
        }

        // Scheduler-level single-flight: drop, don't queue.
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("cycle already running, dropping trigger");
            return;
        };

        self.first_run_done.store(true, Ordering::SeqCst);
        self.stop_flag.store(false, Ordering::SeqCst);
        *self
            .last_cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((Instant::now(), today));

        self.notifier.notice(Notice::CycleStarted { alarm_triggered });
        let ctx = CycleContext {
            session_id: active,
            alarm_triggered,
            bridge: Arc::clone(&self.bridge),
            stop: Arc::clone(&self.stop_flag),
        };
        match self.cycle.run(ctx).await {
            Ok(report) => {
                self.notifier.notice(Notice::CycleFinished {
                    summary: report.summary,
                });
            }
            Err(e) => {
                warn!(error = %e, "task cycle failed");
                self.notifier.notice(Notice::CycleFailed {
                    detail: e.to_string(),
                });
            }
        }
    }

    /// Start the re-login flow: mark the session offline-for-scheduling,
    /// prompt the host to re-authenticate, and schedule a forced
    /// re-initialization after the backoff delay.
    pub async fn relogin(&self) {
        if self.state() == SessionState::Destroyed {
            return;
        }
        let (delay, attempt) = {
            let mut backoff = self.relogin.lock().unwrap_or_else(PoisonError::into_inner);
            let delay = backoff
                .next_delay(Duration::from_millis(self.config.scheduler.check_interval_ms));
            (delay, backoff.attempts())
        };
        self.set_state(SessionState::Offline);
        self.notifier.notice(Notice::ReLoginRequired { attempt });
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "re-login scheduled"
        );

        let tx = self.signal_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(EngineSignal::Restart);
        });
    }

    /// Watchdog: when no cycle has executed for the configured gap, or
    /// execution stalled across midnight, restart the login flow.
    pub async fn check_inactivity(&self) {
        if !self.state().is_running() {
            return;
        }
        let Some((at, day)) = *self
            .last_cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        else {
            return;
        };
        let gap = at.elapsed();
        let now = chrono::Local::now();
        let crossed_midnight = now.date_naive() != day;
        let max_inactive = Duration::from_millis(self.config.scheduler.max_inactive_ms);
        if gap >= max_inactive || (crossed_midnight && now.hour() >= 1) {
            warn!(
                gap_secs = gap.as_secs(),
                crossed_midnight, "no cycle executed for too long, starting re-login"
            );
            self.relogin().await;
        }
    }

    fn persist_day(&self, session_id: &str) {
        let mut status = PersistedStatus::empty(session_id);
        status.day = *self.day.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.store.save(&status) {
            warn!(error = %e, "cannot persist day marker");
        }
    }
}
