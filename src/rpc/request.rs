//! Request and result types for remote procedure calls.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// One logical remote call: method name plus opaque request payload.
///
/// Immutable once built; the same request value may be dispatched several
/// times (retries reuse it verbatim).
#[derive(Debug, Clone)]
pub struct RpcRequest {
    /// Remote method name.
    pub method: String,
    /// Opaque request payload, usually a JSON document.
    pub payload: String,
    id: Uuid,
}

impl RpcRequest {
    /// Build a request for `method` with the given payload.
    pub fn new(method: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            payload: payload.into(),
            id: Uuid::new_v4(),
        }
    }

    /// Unique id for this request value, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Dedup key: method name plus a hash of the payload.
    pub fn signature(&self) -> RequestSignature {
        let mut hasher = DefaultHasher::new();
        self.payload.hash(&mut hasher);
        RequestSignature(format!("{}:{:x}", self.method, hasher.finish()))
    }
}

/// Dedup key derived from a request; two requests with the same method and
/// payload produce equal signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature(String);

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed error payload extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcFailure {
    /// Error code as reported by the remote application (may be empty).
    pub code: String,
    /// Human-readable error message (may be empty).
    pub message: String,
}

/// Outcome of a completed remote call.
///
/// Filled exactly once from the adapter's reply, then read-only. Duplicate
/// concurrent callers share one result behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RpcResult {
    /// Method this result answers.
    pub method: String,
    /// Raw response payload as delivered by the adapter.
    pub response: String,
    /// Parsed failure, when the response is error-shaped.
    pub failure: Option<RpcFailure>,
}

impl RpcResult {
    /// Parse a raw adapter reply into a result.
    ///
    /// A JSON object carrying a `success` or `isSuccess` marker is treated
    /// as a completed call; one without either marker is error-shaped, with
    /// the code taken from `error` and the message from `errorMessage`.
    /// Non-JSON payloads pass through as completed calls — the remote
    /// surface returns plain strings for some methods.
    pub fn from_raw(method: &str, raw: String) -> Self {
        let failure = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(map)) => {
                if map.contains_key("success") || map.contains_key("isSuccess") {
                    None
                } else {
                    let code = map.get("error").map(json_field_string).unwrap_or_default();
                    let message = map
                        .get("errorMessage")
                        .map(json_field_string)
                        .unwrap_or_default();
                    Some(RpcFailure { code, message })
                }
            }
            _ => None,
        };
        Self {
            method: method.to_owned(),
            response: raw,
            failure,
        }
    }

    /// Whether the response was error-shaped.
    pub fn has_error(&self) -> bool {
        self.failure.is_some()
    }
}

/// Render a JSON field as a bare string; codes arrive both quoted and
/// numeric.
fn json_field_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
