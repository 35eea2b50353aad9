//! Single-flight request deduplication.
//!
//! Identical concurrent requests collapse into one underlying call: the
//! first caller becomes the leader and performs the dispatch, duplicates
//! wait (bounded) on the leader's result and receive the same shared
//! outcome. A completed entry lingers for a short grace period so a repeat
//! submission racing the leader's completion still reuses the result
//! instead of re-dialing the backend.

use crate::rpc::request::{RequestSignature, RpcResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Outcome fanned out to duplicate callers: the shared result, or `None`
/// when the underlying call failed entirely.
pub type SharedOutcome = Option<Arc<RpcResult>>;

type PendingMap = HashMap<RequestSignature, (u64, watch::Receiver<Option<SharedOutcome>>)>;

/// What [`SingleFlight::begin`] decided for this caller.
pub enum Flight {
    /// This caller leads: perform the dispatch, then hand the outcome to
    /// the guard so waiting duplicates receive it.
    Lead(FlightGuard),
    /// A leader already produced (or is producing) the outcome.
    Ready(SharedOutcome),
}

/// Keyed pending-request table implementing the single-flight pattern.
#[derive(Debug)]
pub struct SingleFlight {
    pending: Arc<Mutex<PendingMap>>,
    next_token: AtomicU64,
    wait_timeout: Duration,
    grace: Duration,
}

enum Claim {
    Lead(watch::Sender<Option<SharedOutcome>>, u64),
    Follow(watch::Receiver<Option<SharedOutcome>>),
}

impl SingleFlight {
    /// Create a table where duplicates wait up to `wait_timeout` for the
    /// leader and completed entries linger for `grace`.
    pub fn new(wait_timeout: Duration, grace: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
            wait_timeout,
            grace,
        }
    }

    /// Join or start the flight for `signature`.
    ///
    /// Duplicates whose bounded wait expires fall through and issue a
    /// fresh call, per the dispatch contract.
    pub async fn begin(&self, signature: &RequestSignature) -> Flight {
        let claim = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((_, rx)) = pending.get(signature) {
                Claim::Follow(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                pending.insert(signature.clone(), (token, rx));
                Claim::Lead(tx, token)
            }
        };

        let mut rx = match claim {
            Claim::Lead(tx, token) => return Flight::Lead(self.guard(signature, tx, token)),
            Claim::Follow(rx) => rx,
        };

        // Completed within the grace window: reuse immediately.
        if let Some(outcome) = rx.borrow().clone() {
            debug!(signature = %signature, "reusing completed in-flight result");
            return Flight::Ready(outcome);
        }

        debug!(signature = %signature, "waiting for in-flight duplicate");
        match tokio::time::timeout(self.wait_timeout, rx.wait_for(|v| v.is_some())).await {
            Ok(Ok(value)) => Flight::Ready((*value).clone().flatten()),
            Ok(Err(_)) | Err(_) => {
                debug!(signature = %signature, "duplicate wait expired, issuing a fresh call");
                self.take_over(signature)
            }
        }
    }

    /// Replace whatever entry exists for `signature` and lead a new flight.
    fn take_over(&self, signature: &RequestSignature) -> Flight {
        let (tx, rx) = watch::channel(None);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature.clone(), (token, rx));
        Flight::Lead(self.guard(signature, tx, token))
    }

    fn guard(
        &self,
        signature: &RequestSignature,
        tx: watch::Sender<Option<SharedOutcome>>,
        token: u64,
    ) -> FlightGuard {
        FlightGuard {
            signature: signature.clone(),
            token,
            tx,
            pending: Arc::clone(&self.pending),
            grace: self.grace,
        }
    }
}

/// Held by the leading caller; publishes the outcome to duplicates and
/// schedules removal of the pending entry.
pub struct FlightGuard {
    signature: RequestSignature,
    token: u64,
    tx: watch::Sender<Option<SharedOutcome>>,
    pending: Arc<Mutex<PendingMap>>,
    grace: Duration,
}

impl FlightGuard {
    /// Publish the outcome and schedule entry cleanup after the grace
    /// period. The token check keeps a lingering cleanup task from
    /// removing a newer flight that reused the signature.
    pub fn complete(self, outcome: SharedOutcome) {
        let _ = self.tx.send(Some(outcome));
        let pending = Arc::clone(&self.pending);
        let signature = self.signature.clone();
        let token = self.token;
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let mut map = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if map.get(&signature).is_some_and(|(t, _)| *t == token) {
                map.remove(&signature);
            }
        });
    }
}
