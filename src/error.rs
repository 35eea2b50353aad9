//! Error types for the drover engine.

/// Top-level error type for the automation engine.
///
/// Ordinary network flakiness never surfaces here — RPC dispatch resolves
/// failures locally and returns an absent result instead. These variants
/// cover lifecycle operations: configuration, session management, bridge
/// arming, and state persistence.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration load/parse/validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Session lifecycle error (no session, invalid identity).
    #[error("session error: {0}")]
    Session(String),

    /// Remote-call adapter load/arming error.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Durable status (day marker, session id) persistence error.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Signal or notice channel error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
