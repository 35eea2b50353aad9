//! Shared test fixtures: a scripted host surface, a switchable session
//! provider, and a fully-wired controller harness.

use crate::config::{EngineConfig, ProtocolVersion};
use crate::error::Result;
use crate::notify::{ChannelNotifier, Notice};
use crate::offline::OfflineModeController;
use crate::rpc::adapter::{AdapterFactory, AdapterReply, RemoteCallAdapter};
use crate::rpc::bridge::RpcBridge;
use crate::rpc::limit::IntervalRateLimiter;
use crate::session::controller::{
    CycleContext, CycleReport, SessionLifecycleController, TaskCycle,
};
use crate::session::provider::SessionProvider;
use crate::session::status::JsonStatusStore;
use crate::signal::EngineSignal;
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Adapter that always answers with a success-shaped payload.
pub struct StaticAdapter;

#[async_trait]
impl RemoteCallAdapter for StaticAdapter {
    async fn invoke(&self, _method: &str, _payload: &str) -> Option<AdapterReply> {
        Some(AdapterReply {
            success: true,
            raw: r#"{"success":true}"#.to_owned(),
        })
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::Current
    }
}

/// Factory handing out [`StaticAdapter`]s.
pub struct StaticFactory;

impl AdapterFactory for StaticFactory {
    fn connect(&self, _protocol: ProtocolVersion) -> Result<Arc<dyn RemoteCallAdapter>> {
        Ok(Arc::new(StaticAdapter))
    }
}

/// Session provider whose identity can be switched mid-test.
pub struct SwitchableProvider {
    id: Mutex<Option<String>>,
}

impl SwitchableProvider {
    pub fn new(id: Option<&str>) -> Self {
        Self {
            id: Mutex::new(id.map(str::to_owned)),
        }
    }

    pub fn set_session(&self, id: Option<&str>) {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = id.map(str::to_owned);
    }
}

impl SessionProvider for SwitchableProvider {
    fn current_session_id(&self) -> Option<String> {
        self.id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Task cycle that counts its runs and optionally dawdles.
pub struct CountingCycle {
    pub runs: AtomicUsize,
    pub delay: Duration,
}

#[async_trait]
impl TaskCycle for CountingCycle {
    async fn run(&self, _ctx: CycleContext) -> Result<CycleReport> {
        self.runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(CycleReport::new("counted"))
    }
}

/// Knobs for [`ControllerHarness`].
pub struct HarnessOptions {
    pub config: EngineConfig,
    pub cycle_delay: Duration,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        let mut config = EngineConfig::default();
        // Keep tests fast: no per-method pacing.
        config.bridge.default_method_interval_ms = 0;
        Self {
            config,
            cycle_delay: Duration::ZERO,
        }
    }
}

/// A controller wired against in-memory collaborators and a temp-dir
/// status store.
pub struct ControllerHarness {
    pub controller: Arc<SessionLifecycleController>,
    pub provider: Arc<SwitchableProvider>,
    pub cycle: Arc<CountingCycle>,
    pub bridge: Arc<RpcBridge>,
    notices: mpsc::UnboundedReceiver<Notice>,
    signals: mpsc::UnboundedReceiver<EngineSignal>,
    _state_dir: tempfile::TempDir,
}

impl ControllerHarness {
    pub async fn new(options: HarnessOptions) -> Self {
        let state_dir = tempfile::tempdir().expect("tempdir");
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let notifier = Arc::new(ChannelNotifier::new(notice_tx));

        let offline = Arc::new(OfflineModeController::new(
            &options.config.offline,
            Arc::clone(&notifier) as Arc<dyn crate::notify::Notifier>,
            signal_tx.clone(),
        ));
        let limiter = Arc::new(IntervalRateLimiter::new(Duration::from_millis(
            options.config.bridge.default_method_interval_ms,
        )));
        let bridge = Arc::new(RpcBridge::new(
            &options.config,
            Arc::new(StaticFactory),
            limiter,
            Arc::clone(&offline),
        ));
        let provider = Arc::new(SwitchableProvider::new(Some("user-1")));
        let cycle = Arc::new(CountingCycle {
            runs: AtomicUsize::new(0),
            delay: options.cycle_delay,
        });
        let store = Arc::new(JsonStatusStore::new(state_dir.path().to_path_buf()));

        let controller = Arc::new(SessionLifecycleController::new(
            options.config,
            Arc::clone(&bridge),
            offline,
            Arc::clone(&provider) as Arc<dyn SessionProvider>,
            store,
            Arc::clone(&cycle) as Arc<dyn TaskCycle>,
            notifier,
            signal_tx,
        ));

        Self {
            controller,
            provider,
            cycle,
            bridge,
            notices,
            signals,
            _state_dir: state_dir,
        }
    }

    /// Next notice, bounded.
    pub async fn next_notice(&mut self) -> Notice {
        tokio::time::timeout(Duration::from_secs(2), self.notices.recv())
            .await
            .expect("notice in time")
            .expect("notice channel open")
    }

    /// Next engine signal, bounded.
    pub async fn wait_signal(&mut self) -> EngineSignal {
        tokio::time::timeout(Duration::from_secs(2), self.signals.recv())
            .await
            .expect("signal in time")
            .expect("signal channel open")
    }
}
