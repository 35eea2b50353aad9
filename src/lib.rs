//! Drover: resilient RPC automation engine.
//!
//! Drives a recurring task cycle against a remote host application on
//! behalf of a signed-in account, surviving flaky connectivity, session
//! expiry, and restarts without duplicating work or hammering a failing
//! backend.
//!
//! # Architecture
//!
//! Two halves, inseparable by design:
//! - **RPC execution** ([`rpc`]): a versioned bridge that deduplicates
//!   concurrent identical calls (single-flight), retries transient
//!   failures with capped exponential backoff, classifies errors from a
//!   configured vocabulary, paces each method, and quarantines throttled
//!   ones.
//! - **Session lifecycle** ([`session`]): the state machine gating task
//!   cycles — initialization, trigger gating, day rollover, re-login
//!   backoff, and an inactivity watchdog — plus the offline controller
//!   ([`offline`]) both halves share.
//!
//! [`Engine`] owns all of it: construct one with the host-specific
//! collaborators (adapter factory, session provider, task cycle), call
//! [`Engine::run`], and steer it with [`EngineSignal`]s.

pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod offline;
pub mod rpc;
pub mod session;
pub mod signal;

#[cfg(test)]
mod test_utils;

pub use config::{EngineConfig, ProtocolVersion};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, Result};
pub use notify::{ChannelNotifier, LogNotifier, Notice, Notifier};
pub use offline::OfflineModeController;
pub use rpc::{
    AdapterFactory, AdapterReply, RemoteCallAdapter, RpcBridge, RpcRequest, RpcResult,
};
pub use session::{
    CycleContext, CycleReport, SessionLifecycleController, SessionProvider, SessionState,
    TaskCycle,
};
pub use signal::{EngineSignal, EngineStatus};
