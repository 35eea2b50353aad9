//! Durable per-session status: the session identifier and last-run day
//! marker — the only state the engine needs across restarts.

use crate::config::default_state_dir;
use crate::error::{EngineError, Result};
use crate::session::day::DayMarker;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Persisted per-session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStatus {
    /// Schema version.
    #[serde(default = "default_status_version")]
    pub version: u8,
    /// Session identifier this status belongs to.
    pub session_id: String,
    /// Last-known calendar day, if a cycle has ever run.
    #[serde(default)]
    pub day: Option<DayMarker>,
}

fn default_status_version() -> u8 {
    1
}

impl PersistedStatus {
    /// Fresh status for a session with no history.
    pub fn empty(session_id: &str) -> Self {
        Self {
            version: default_status_version(),
            session_id: session_id.to_owned(),
            day: None,
        }
    }
}

/// Durability seam for [`PersistedStatus`].
pub trait StatusStore: Send + Sync {
    /// Load the status for a session; a session with no stored status
    /// yields [`PersistedStatus::empty`].
    fn load(&self, session_id: &str) -> Result<PersistedStatus>;

    /// Persist the status.
    fn save(&self, status: &PersistedStatus) -> Result<()>;
}

/// File-backed store: one pretty-printed JSON document per session under
/// a state directory.
#[derive(Debug)]
pub struct JsonStatusStore {
    dir: PathBuf,
}

impl JsonStatusStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store rooted at the platform default state directory, falling back
    /// to the system temp directory when none can be resolved.
    pub fn at_default_dir() -> Self {
        let dir = default_state_dir().unwrap_or_else(|| std::env::temp_dir().join("drover"));
        Self::new(dir)
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        // Session ids come from the host application; keep the file name
        // tame regardless of their alphabet.
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("status-{safe}.json"))
    }
}

impl StatusStore for JsonStatusStore {
    fn load(&self, session_id: &str) -> Result<PersistedStatus> {
        let path = self.path_for(session_id);
        let bytes = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedStatus::empty(session_id));
            }
            Err(e) => {
                return Err(EngineError::Persistence(format!(
                    "cannot read status: {e}"
                )));
            }
        };
        let status: PersistedStatus = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Persistence(format!("cannot parse status: {e}")))?;
        debug!(session_id, path = %path.display(), "loaded persisted status");
        Ok(status)
    }

    fn save(&self, status: &PersistedStatus) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| EngineError::Persistence(format!("cannot create state dir: {e}")))?;
        let json = serde_json::to_string_pretty(status)
            .map_err(|e| EngineError::Persistence(format!("cannot serialize status: {e}")))?;
        std::fs::write(self.path_for(&status.session_id), json)
            .map_err(|e| EngineError::Persistence(format!("cannot write status: {e}")))?;
        Ok(())
    }
}
