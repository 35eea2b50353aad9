//! Remote-call adapter seam.
//!
//! The engine does not know how a call reaches the host application — it
//! only requires an adapter whose reply eventually arrives at most once
//! per invocation, or not at all within the adapter's own timeout.

use crate::config::ProtocolVersion;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Reply delivered by the adapter's callback.
#[derive(Debug, Clone)]
pub struct AdapterReply {
    /// Whether the transport delivered the call. `false` means the call
    /// was declined before reaching the remote surface; the payload is
    /// then diagnostic only.
    pub success: bool,
    /// Raw response payload.
    pub raw: String,
}

/// One attempt of a remote call into the host application.
///
/// `None` models "the callback never fired": the adapter's own timeout
/// expired without a reply. The bridge treats that as a failed attempt.
#[async_trait]
pub trait RemoteCallAdapter: Send + Sync {
    /// Invoke `method` with the given payload and wait for the reply.
    async fn invoke(&self, method: &str, payload: &str) -> Option<AdapterReply>;

    /// Protocol variant this adapter speaks.
    fn protocol(&self) -> ProtocolVersion;
}

/// Builds (and rebuilds) adapters for a protocol variant.
///
/// The bridge calls this at session start and once more per dispatch when
/// its handle has been torn down — the single lazy reload.
pub trait AdapterFactory: Send + Sync {
    /// Connect an adapter speaking `protocol`.
    fn connect(&self, protocol: ProtocolVersion) -> Result<Arc<dyn RemoteCallAdapter>>;
}
