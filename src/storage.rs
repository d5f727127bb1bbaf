//! Storage layout for tasktime
//!
//! All state lives in a single home directory.
//!
//! # Directory Structure
//!
//! ```text
//! <home>/
//!   tasktime.toml         # Configuration
//!   tasks.tsv             # Task table (atomic rewrites)
//!   sessions.log          # Append-only session event log
//!   notify-state.json     # Persisted throttle state (optional)
//!   *.lock                # Advisory lock files
//! ```
//!
//! The home directory is resolved from `--home`, then `TASKTIME_HOME`, then
//! the platform data directory.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "TASKTIME_HOME";

pub const CONFIG_FILE: &str = "tasktime.toml";
pub const TASKS_FILE: &str = "tasks.tsv";
pub const SESSIONS_FILE: &str = "sessions.log";
pub const NOTIFY_STATE_FILE: &str = "notify-state.json";

/// Storage manager rooted at the tasktime home directory
#[derive(Debug, Clone)]
pub struct Storage {
    home: PathBuf,
}

impl Storage {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve the home directory from an explicit path or the platform default
    ///
    /// clap already folds `TASKTIME_HOME` into the explicit value; the
    /// environment is consulted here too so library callers get the same
    /// resolution.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }

        if let Ok(value) = std::env::var(HOME_ENV) {
            if !value.trim().is_empty() {
                return Ok(Self::new(value.trim()));
            }
        }

        let dirs = ProjectDirs::from("", "", "tasktime").ok_or_else(|| {
            Error::InvalidConfig(format!(
                "cannot determine a data directory; set {HOME_ENV} or pass --home"
            ))
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.home.join(TASKS_FILE)
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.home.join(SESSIONS_FILE)
    }

    pub fn notify_state_file(&self) -> PathBuf {
        self.home.join(NOTIFY_STATE_FILE)
    }

    pub fn ensure_home(&self) -> Result<()> {
        fs::create_dir_all(&self.home)?;
        Ok(())
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Read JSON from `path`; `None` when the file does not exist
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write pretty JSON atomically under the file's lock
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic_locked(path, json.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn paths_live_under_home() {
        let storage = Storage::new("/tmp/tt-home");
        assert_eq!(storage.tasks_file(), PathBuf::from("/tmp/tt-home/tasks.tsv"));
        assert_eq!(
            storage.sessions_file(),
            PathBuf::from("/tmp/tt-home/sessions.log")
        );
        assert_eq!(
            storage.config_file(),
            PathBuf::from("/tmp/tt-home/tasktime.toml")
        );
        assert_eq!(
            storage.notify_state_file(),
            PathBuf::from("/tmp/tt-home/notify-state.json")
        );
    }

    #[test]
    fn explicit_home_wins() {
        let storage = Storage::resolve(Some(Path::new("/srv/tasktime"))).unwrap();
        assert_eq!(storage.home(), Path::new("/srv/tasktime"));
    }

    #[test]
    fn json_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let path = storage.notify_state_file();

        let missing: Option<BTreeMap<String, u32>> = storage.read_json(&path).unwrap();
        assert!(missing.is_none());

        let mut data = BTreeMap::new();
        data.insert("session_start".to_string(), 3u32);
        storage.write_json(&path, &data).unwrap();

        let loaded: Option<BTreeMap<String, u32>> = storage.read_json(&path).unwrap();
        assert_eq!(loaded, Some(data));
    }
}
