//! Error classification for remote-call failures.

use crate::config::ClassifierConfig;
use std::collections::HashSet;

/// Category assigned to an error-shaped response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Busy/throttled/unavailable — retried with backoff, counted toward
    /// the offline threshold.
    Transient,
    /// The session itself is invalid — no retry; escalate and re-login.
    SessionTerminating,
    /// Unmatched error vocabulary. Likely a business-level soft failure;
    /// the result is handed back to the caller unretried.
    Unknown,
}

/// Pure mapping from `(code, message)` to an [`ErrorClass`].
///
/// The vocabulary comes from configuration — the remote application's
/// error codes change independently of this engine.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    transient_codes: HashSet<String>,
    transient_keywords: Vec<String>,
    session_codes: HashSet<String>,
    session_keywords: Vec<String>,
}

impl ErrorClassifier {
    /// Build a classifier from configured code and keyword sets.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            transient_codes: config.transient_codes.iter().cloned().collect(),
            transient_keywords: config
                .transient_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            session_codes: config.session_codes.iter().cloned().collect(),
            session_keywords: config
                .session_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// Classify an error code/message pair.
    ///
    /// Session codes win over transient ones; keyword matching is a
    /// case-insensitive substring check on the message.
    pub fn classify(&self, code: &str, message: &str) -> ErrorClass {
        if self.session_codes.contains(code) {
            return ErrorClass::SessionTerminating;
        }
        let lower = message.to_lowercase();
        if self.session_keywords.iter().any(|k| lower.contains(k)) {
            return ErrorClass::SessionTerminating;
        }
        if self.transient_codes.contains(code) {
            return ErrorClass::Transient;
        }
        if self.transient_keywords.iter().any(|k| lower.contains(k)) {
            return ErrorClass::Transient;
        }
        ErrorClass::Unknown
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}
