//! RPC execution: request types, classification, backoff, pacing,
//! single-flight dedup, and the versioned bridge that ties them together.

pub mod adapter;
pub mod backoff;
pub mod bridge;
pub mod classify;
pub mod health;
pub mod limit;
pub mod request;
pub mod single_flight;

pub use adapter::{AdapterFactory, AdapterReply, RemoteCallAdapter};
pub use backoff::BackoffPolicy;
pub use bridge::{DEFAULT_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS, RpcBridge};
pub use classify::{ErrorClass, ErrorClassifier};
pub use health::{MethodHealth, MethodStats};
pub use limit::{IntervalRateLimiter, RateLimiter};
pub use request::{RequestSignature, RpcFailure, RpcRequest, RpcResult};
pub use single_flight::{Flight, SharedOutcome, SingleFlight};
