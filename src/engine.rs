//! Engine assembly and run loop.
//!
//! [`Engine`] is the explicitly-constructed context object owning every
//! mutable piece of the system — configuration, bridge, offline
//! controller, session controller, and the signal channel. There are no
//! module-level statics; create an engine, run it, drop it.
//!
//! The run loop multiplexes two trigger sources: a periodic tick (the
//! alarm) and external control signals. Each trigger is handled to
//! completion before the next is taken; cycle-level single-flight keeps a
//! slow cycle from piling up work behind it.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::offline::OfflineModeController;
use crate::rpc::adapter::AdapterFactory;
use crate::rpc::bridge::RpcBridge;
use crate::rpc::limit::{IntervalRateLimiter, RateLimiter};
use crate::session::controller::{SessionLifecycleController, TaskCycle};
use crate::session::provider::SessionProvider;
use crate::session::status::{JsonStatusStore, StatusStore};
use crate::signal::EngineSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Builder for [`Engine`].
///
/// The adapter factory, session provider, and task cycle are mandatory;
/// the notifier, status store, and rate limiter have working defaults.
pub struct EngineBuilder {
    config: EngineConfig,
    factory: Option<Arc<dyn AdapterFactory>>,
    provider: Option<Arc<dyn SessionProvider>>,
    cycle: Option<Arc<dyn TaskCycle>>,
    notifier: Option<Arc<dyn Notifier>>,
    store: Option<Arc<dyn StatusStore>>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl EngineBuilder {
    /// Set the remote-call adapter factory.
    pub fn with_adapter_factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the session/account provider.
    pub fn with_session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the task cycle executed on each eligible trigger.
    pub fn with_task_cycle(mut self, cycle: Arc<dyn TaskCycle>) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Replace the default log-backed notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the default JSON-file status store.
    pub fn with_status_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default per-method interval rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Wire everything together.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let factory = self
            .factory
            .ok_or_else(|| EngineError::Config("an adapter factory is required".to_owned()))?;
        let provider = self
            .provider
            .ok_or_else(|| EngineError::Config("a session provider is required".to_owned()))?;
        let cycle = self
            .cycle
            .ok_or_else(|| EngineError::Config("a task cycle is required".to_owned()))?;

        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier) as Arc<dyn Notifier>);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(JsonStatusStore::at_default_dir()) as Arc<dyn StatusStore>);
        let limiter = self.limiter.unwrap_or_else(|| {
            Arc::new(IntervalRateLimiter::new(Duration::from_millis(
                self.config.bridge.default_method_interval_ms,
            ))) as Arc<dyn RateLimiter>
        });

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let offline = Arc::new(OfflineModeController::new(
            &self.config.offline,
            Arc::clone(&notifier),
            signal_tx.clone(),
        ));
        let bridge = Arc::new(RpcBridge::new(
            &self.config,
            factory,
            limiter,
            Arc::clone(&offline),
        ));
        let controller = Arc::new(SessionLifecycleController::new(
            self.config.clone(),
            Arc::clone(&bridge),
            Arc::clone(&offline),
            provider,
            store,
            cycle,
            Arc::clone(&notifier),
            signal_tx.clone(),
        ));

        Ok(Engine {
            config: self.config,
            controller,
            bridge,
            notifier,
            signal_tx,
            signal_rx,
        })
    }
}

/// The assembled automation engine.
pub struct Engine {
    config: EngineConfig,
    controller: Arc<SessionLifecycleController>,
    bridge: Arc<RpcBridge>,
    notifier: Arc<dyn Notifier>,
    signal_tx: mpsc::UnboundedSender<EngineSignal>,
    signal_rx: mpsc::UnboundedReceiver<EngineSignal>,
}

impl Engine {
    /// Start building an engine around `config`.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            factory: None,
            provider: None,
            cycle: None,
            notifier: None,
            store: None,
            limiter: None,
        }
    }

    /// Sender half of the signal channel, for external transports.
    pub fn signal_sender(&self) -> mpsc::UnboundedSender<EngineSignal> {
        self.signal_tx.clone()
    }

    /// The session controller, for direct lifecycle calls.
    pub fn controller(&self) -> &Arc<SessionLifecycleController> {
        &self.controller
    }

    /// The RPC bridge, for issuing calls outside a task cycle.
    pub fn bridge(&self) -> &Arc<RpcBridge> {
        &self.bridge
    }

    /// Run the engine: initialize the session, then serve ticks and
    /// signals until the signal channel closes.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        let Engine {
            config,
            controller,
            bridge: _,
            notifier,
            signal_tx: _,
            mut signal_rx,
        } = self;

        tokio::spawn(async move {
            info!("engine started");
            if controller.initialize(true).await {
                controller.execute_trigger(true).await;
            } else {
                // No session yet (or the bridge would not arm): keep the
                // re-login flow knocking with its capped backoff.
                controller.relogin().await;
            }

            let mut tick = tokio::time::interval(Duration::from_millis(
                config.scheduler.check_interval_ms,
            ));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The interval's first tick completes immediately; the startup
            // run above already covered it.
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        controller.check_inactivity().await;
                        controller.execute_trigger(true).await;
                    }
                    signal = signal_rx.recv() => {
                        let Some(signal) = signal else {
                            info!("signal channel closed, engine stopping");
                            break;
                        };
                        dispatch_signal(&controller, &notifier, signal).await;
                    }
                }
            }
        })
    }
}

/// Handle one control signal.
async fn dispatch_signal(
    controller: &Arc<SessionLifecycleController>,
    notifier: &Arc<dyn Notifier>,
    signal: EngineSignal,
) {
    debug!(signal = ?signal, "handling signal");
    match signal {
        EngineSignal::Restart => {
            if controller.initialize(true).await {
                controller.execute_trigger(true).await;
            } else {
                controller.relogin().await;
            }
        }
        EngineSignal::Execute { alarm_triggered } => {
            // A trigger may arrive before any session exists; establish
            // one on demand, without tearing down a live session.
            let _ = controller.initialize(false).await;
            controller.execute_trigger(alarm_triggered).await;
        }
        EngineSignal::ReLogin => controller.relogin().await,
        EngineSignal::StatusQuery => notifier.notice(Notice::Status(controller.status())),
    }
}
