//! Configuration types for the automation engine.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// RPC bridge and dispatch settings.
    pub bridge: BridgeConfig,
    /// Error-classification vocabulary.
    pub classifier: ClassifierConfig,
    /// Offline-mode escalation settings.
    pub offline: OfflineConfig,
    /// Scheduler and re-login settings.
    pub scheduler: SchedulerConfig,
}

/// Which remote-call protocol the adapter factory should speak.
///
/// Both variants sit behind the same [`RemoteCallAdapter`] contract; the
/// factory picks the concrete wiring at session start.
///
/// [`RemoteCallAdapter`]: crate::rpc::adapter::RemoteCallAdapter
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// Older host-application call surface.
    Legacy,
    /// Current host-application call surface.
    #[default]
    Current,
}

/// RPC bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Remote-call protocol variant to arm at session start.
    pub protocol: ProtocolVersion,
    /// Default attempt budget when a call site does not supply one.
    pub default_attempts: i32,
    /// Default minimum interval between calls to the same method (ms).
    pub default_method_interval_ms: u64,
    /// How long a duplicate caller waits for an in-flight identical
    /// request before issuing a fresh call (ms).
    pub duplicate_wait_ms: u64,
    /// How long a completed in-flight entry lingers to absorb immediate
    /// repeat submissions (ms).
    pub pending_grace_ms: u64,
    /// Error codes that quarantine the offending method.
    pub quarantine_codes: Vec<String>,
    /// Quarantine window length (ms).
    pub quarantine_duration_ms: u64,
    /// Methods whose failures are expected and log at debug level only.
    pub silent_error_methods: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::Current,
            default_attempts: 3,
            default_method_interval_ms: 500,
            duplicate_wait_ms: 3000,
            pending_grace_ms: 5000,
            quarantine_codes: vec!["1009".to_owned()],
            quarantine_duration_ms: 10 * 60 * 1000,
            silent_error_methods: Vec::new(),
        }
    }
}

/// Error-classification vocabulary.
///
/// The remote application's error codes change independently of this
/// engine, so the sets are configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Error codes classified as transient (retried with backoff).
    pub transient_codes: Vec<String>,
    /// Message keywords classified as transient (case-insensitive contains).
    pub transient_keywords: Vec<String>,
    /// Error codes that terminate the session (re-login, no retry).
    pub session_codes: Vec<String>,
    /// Message keywords that terminate the session.
    pub session_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            transient_codes: vec![
                "1004".to_owned(),
                "1009".to_owned(),
                "46".to_owned(),
                "48".to_owned(),
            ],
            transient_keywords: vec![
                "busy".to_owned(),
                "rejected".to_owned(),
                "unavailable".to_owned(),
                "retry".to_owned(),
                "throttled".to_owned(),
            ],
            session_codes: vec!["2000".to_owned()],
            session_keywords: vec!["session expired".to_owned(), "login timeout".to_owned()],
        }
    }
}

/// Offline-mode escalation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Consecutive transient failures that flip the offline flag.
    pub error_threshold: u32,
    /// Whether a transient failure also requests the re-login flow.
    pub relogin_on_error: bool,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            error_threshold: 6,
            relogin_on_error: false,
        }
    }
}

/// Scheduler, day-rollover, and re-login configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between periodic engine ticks (ms).
    pub check_interval_ms: u64,
    /// Whether a manual (non-alarm) trigger may start a cycle after the
    /// first run.
    pub auto_schedule_on_manual_trigger: bool,
    /// Re-login attempts before the delay switches to the floor schedule.
    pub relogin_max_attempts: u32,
    /// Linear step between early re-login attempts (ms).
    pub relogin_step_ms: u64,
    /// Minimum delay once re-login attempts are exhausted (ms).
    pub relogin_floor_ms: u64,
    /// Inactivity gap after which the watchdog restarts the login flow (ms).
    pub max_inactive_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 180_000,
            auto_schedule_on_manual_trigger: false,
            relogin_max_attempts: 5,
            relogin_step_ms: 5000,
            relogin_floor_ms: 180_000,
            max_inactive_ms: 3_600_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the default configuration; a malformed one is
    /// an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(EngineError::Config(format!("cannot read config: {e}")));
            }
        };
        let config: Self = toml::from_str(&text)
            .map_err(|e| EngineError::Config(format!("cannot parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist configuration to a TOML file.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Config(format!("cannot create config dir: {e}")))?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, text)
            .map_err(|e| EngineError::Config(format!("cannot write config: {e}")))?;
        Ok(())
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.offline.error_threshold == 0 {
            return Err(EngineError::Config(
                "offline.error_threshold must be at least 1".to_owned(),
            ));
        }
        if self.scheduler.check_interval_ms == 0 {
            return Err(EngineError::Config(
                "scheduler.check_interval_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Default directory for engine state files.
pub fn default_state_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("LOCALAPPDATA").map(|d| PathBuf::from(d).join("drover"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config").join("drover"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bridge.default_attempts, 3);
        assert_eq!(config.scheduler.relogin_max_attempts, 5);
        assert_eq!(config.bridge.protocol, ProtocolVersion::Current);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [offline]
            error_threshold = 3

            [bridge]
            protocol = "legacy"
            "#,
        )
        .unwrap();
        assert_eq!(config.offline.error_threshold, 3);
        assert_eq!(config.bridge.protocol, ProtocolVersion::Legacy);
        // Untouched sections keep their defaults.
        assert_eq!(config.scheduler.check_interval_ms, 180_000);
        assert!(config.classifier.session_codes.contains(&"2000".to_owned()));
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("drover.toml");

        let mut config = EngineConfig::default();
        config.scheduler.auto_schedule_on_manual_trigger = true;
        config.save_to_path(&path).expect("save");

        let restored = EngineConfig::load_from_path(&path).expect("load");
        assert!(restored.scheduler.auto_schedule_on_manual_trigger);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = EngineConfig::load_from_path(Path::new("/nonexistent/drover.toml"))
            .expect("defaults");
        assert_eq!(config.offline.error_threshold, 6);
    }

    #[test]
    fn zero_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.offline.error_threshold = 0;
        assert!(config.validate().is_err());
    }
}
