//! Versioned RPC bridge.
//!
//! Performs one attempt of a remote call through the adapter, parses the
//! outcome, classifies errors, and drives the retry loop. Dispatch is
//! gated by the offline flag and per-method quarantine, paced by the rate
//! limiter, and deduplicated through the single-flight table.
//!
//! All RPC-level failures resolve locally: callers receive an ordinary
//! absent outcome, never an error, for network flakiness.

use crate::config::{EngineConfig, ProtocolVersion};
use crate::error::{EngineError, Result};
use crate::offline::OfflineModeController;
use crate::rpc::adapter::{AdapterFactory, RemoteCallAdapter};
use crate::rpc::backoff::BackoffPolicy;
use crate::rpc::classify::{ErrorClass, ErrorClassifier};
use crate::rpc::health::MethodHealth;
use crate::rpc::limit::RateLimiter;
use crate::rpc::request::{RpcRequest, RpcResult};
use crate::rpc::single_flight::{Flight, SharedOutcome, SingleFlight};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Default attempt budget when a call site does not supply one.
pub const DEFAULT_ATTEMPTS: i32 = 3;

/// Default retry-interval hint: negative selects the exponential schedule.
pub const DEFAULT_RETRY_INTERVAL_MS: i64 = -1;

/// The request bridge: adapter handle, pacing, classification, retry.
pub struct RpcBridge {
    protocol: ProtocolVersion,
    factory: Arc<dyn AdapterFactory>,
    /// Live adapter handle. Dispatch paths snapshot the `Arc` so a
    /// concurrent unload never hands them a half-torn reference.
    adapter: Mutex<Option<Arc<dyn RemoteCallAdapter>>>,
    limiter: Arc<dyn RateLimiter>,
    classifier: ErrorClassifier,
    backoff: BackoffPolicy,
    offline: Arc<OfflineModeController>,
    flights: SingleFlight,
    health: MethodHealth,
    silent_methods: HashSet<String>,
}

impl RpcBridge {
    /// Assemble a bridge from configuration and its collaborators.
    pub fn new(
        config: &EngineConfig,
        factory: Arc<dyn AdapterFactory>,
        limiter: Arc<dyn RateLimiter>,
        offline: Arc<OfflineModeController>,
    ) -> Self {
        Self {
            protocol: config.bridge.protocol,
            factory,
            adapter: Mutex::new(None),
            limiter,
            classifier: ErrorClassifier::from_config(&config.classifier),
            backoff: BackoffPolicy::default(),
            offline,
            flights: SingleFlight::new(
                Duration::from_millis(config.bridge.duplicate_wait_ms),
                Duration::from_millis(config.bridge.pending_grace_ms),
            ),
            health: MethodHealth::new(
                &config.bridge.quarantine_codes,
                Duration::from_millis(config.bridge.quarantine_duration_ms),
            ),
            silent_methods: config.bridge.silent_error_methods.iter().cloned().collect(),
        }
    }

    /// Protocol variant this bridge was configured for.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Arm the bridge: connect an adapter through the factory.
    pub fn load(&self) -> Result<()> {
        let adapter = self.factory.connect(self.protocol)?;
        if adapter.protocol() != self.protocol {
            return Err(EngineError::Bridge(format!(
                "factory returned {:?} adapter for {:?}",
                adapter.protocol(),
                self.protocol
            )));
        }
        *self.adapter.lock().unwrap_or_else(PoisonError::into_inner) = Some(adapter);
        debug!(protocol = ?self.protocol, "bridge armed");
        Ok(())
    }

    /// Release the adapter handle. Calls already holding a snapshot run to
    /// completion.
    pub fn unload(&self) {
        *self.adapter.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("bridge released");
    }

    /// Whether an adapter handle is currently armed.
    pub fn is_loaded(&self) -> bool {
        self.adapter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Per-method health and quarantine tracker.
    pub fn health(&self) -> &MethodHealth {
        &self.health
    }

    /// Drop session-scoped dispatch state (stats, quarantine, pacing).
    pub fn reset_session_state(&self) {
        self.health.clear();
        self.limiter.reset();
    }

    /// Dispatch a request with the default attempt budget and backoff.
    pub async fn request_string(&self, method: &str, payload: &str) -> Option<String> {
        self.request_string_with(method, payload, DEFAULT_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS)
            .await
    }

    /// Dispatch a request and return the raw response string.
    pub async fn request_string_with(
        &self,
        method: &str,
        payload: &str,
        max_attempts: i32,
        retry_interval_ms: i64,
    ) -> Option<String> {
        let request = RpcRequest::new(method, payload);
        self.request_object(&request, max_attempts, retry_interval_ms)
            .await
            .map(|result| result.response.clone())
    }

    /// Dispatch a request, retrying per the interval hint, and return the
    /// shared result — or absent when the call could not complete.
    ///
    /// - `max_attempts <= 0`: no attempt is made.
    /// - `retry_interval_ms < 0`: exponential backoff; `0`: immediate
    ///   retry; `> 0`: exact wait between attempts.
    pub async fn request_object(
        &self,
        request: &RpcRequest,
        max_attempts: i32,
        retry_interval_ms: i64,
    ) -> SharedOutcome {
        if max_attempts <= 0 {
            return None;
        }
        if self.offline.is_offline() {
            debug!(method = request.method.as_str(), "offline, dropping dispatch");
            return None;
        }
        if self.health.is_suspended(&request.method) {
            debug!(
                method = request.method.as_str(),
                "method quarantined, dropping dispatch"
            );
            return None;
        }
        let Some(adapter) = self.snapshot_adapter() else {
            return None;
        };

        let signature = request.signature();
        match self.flights.begin(&signature).await {
            Flight::Ready(outcome) => {
                debug!(
                    method = request.method.as_str(),
                    id = %request.id(),
                    "reusing in-flight result"
                );
                outcome
            }
            Flight::Lead(guard) => {
                let outcome = self
                    .attempt_loop(&adapter, request, max_attempts as u32, retry_interval_ms)
                    .await;
                guard.complete(outcome.clone());
                outcome
            }
        }
    }

    /// Run up to `max_attempts` attempts of the call.
    async fn attempt_loop(
        &self,
        adapter: &Arc<dyn RemoteCallAdapter>,
        request: &RpcRequest,
        max_attempts: u32,
        retry_interval_ms: i64,
    ) -> SharedOutcome {
        for attempt in 1..=max_attempts {
            self.limiter.await_slot(&request.method).await;

            let Some(reply) = adapter.invoke(&request.method, &request.payload).await else {
                self.log_attempt_failure(request, "no reply from adapter", attempt);
                self.health.record_failure(&request.method, None);
                self.wait_before_retry(attempt, max_attempts, retry_interval_ms)
                    .await;
                continue;
            };

            if !reply.success {
                self.log_attempt_failure(request, "adapter declined the call", attempt);
                self.health.record_failure(&request.method, None);
                self.wait_before_retry(attempt, max_attempts, retry_interval_ms)
                    .await;
                continue;
            }

            let result = RpcResult::from_raw(&request.method, reply.raw);
            let Some(failure) = result.failure.clone() else {
                self.offline.on_success();
                self.health.record_success(&request.method);
                return Some(Arc::new(result));
            };

            self.health
                .record_failure(&request.method, Some(&failure.code));
            match self.classifier.classify(&failure.code, &failure.message) {
                ErrorClass::Unknown => {
                    // Likely a business-level soft failure; hand it back
                    // unretried and let the caller interpret it.
                    debug!(
                        method = request.method.as_str(),
                        code = failure.code.as_str(),
                        "unclassified error returned to caller"
                    );
                    return Some(Arc::new(result));
                }
                ErrorClass::SessionTerminating => {
                    warn!(
                        method = request.method.as_str(),
                        code = failure.code.as_str(),
                        message = failure.message.as_str(),
                        "session-terminating error"
                    );
                    self.offline
                        .on_session_error(&request.method, &failure.message);
                    return None;
                }
                ErrorClass::Transient => {
                    let _ = self
                        .offline
                        .on_transient_error(&request.method, &failure.message);
                    if self.offline.is_offline() {
                        return None;
                    }
                    self.log_attempt_failure(
                        request,
                        &format!("transient error {}", failure.code),
                        attempt,
                    );
                    self.wait_before_retry(attempt, max_attempts, retry_interval_ms)
                        .await;
                }
            }
        }
        self.log_attempt_failure(request, "attempts exhausted", max_attempts);
        None
    }

    /// Snapshot the adapter handle, attempting exactly one lazy reload when
    /// the bridge is not armed.
    fn snapshot_adapter(&self) -> Option<Arc<dyn RemoteCallAdapter>> {
        {
            let guard = self.adapter.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(adapter) = guard.as_ref() {
                return Some(Arc::clone(adapter));
            }
        }
        debug!("bridge not armed, attempting reload");
        match self.load() {
            Ok(()) => self
                .adapter
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(Arc::clone),
            Err(e) => {
                warn!(error = %e, "bridge reload failed");
                None
            }
        }
    }

    async fn wait_before_retry(&self, attempt: u32, max_attempts: u32, retry_interval_ms: i64) {
        if attempt >= max_attempts {
            return;
        }
        let wait = self.backoff.delay(attempt, retry_interval_ms);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn log_attempt_failure(&self, request: &RpcRequest, reason: &str, attempt: u32) {
        if self.silent_methods.contains(&request.method) {
            debug!(
                method = request.method.as_str(),
                id = %request.id(),
                reason,
                attempt,
                "call attempt failed"
            );
        } else {
            warn!(
                method = request.method.as_str(),
                id = %request.id(),
                reason,
                attempt,
                "call attempt failed"
            );
        }
    }
}
