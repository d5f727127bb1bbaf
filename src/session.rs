//! Session event log.
//!
//! `<home>/sessions.log` is append-only, one event per line:
//! `task_id<TAB>action<TAB>RFC3339 timestamp`. Events are consumed in file
//! order; nothing re-sorts them.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    Pause,
    End,
}

impl SessionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::End => "end",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionAction {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "start" => Ok(SessionAction::Start),
            "pause" => Ok(SessionAction::Pause),
            "end" => Ok(SessionAction::End),
            other => Err(Error::InvalidArgument(format!(
                "unknown session action '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub task_id: u64,
    pub action: SessionAction,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(task_id: u64, action: SessionAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            task_id,
            action,
            timestamp,
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.task_id,
            self.action,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let mut fields = line.split('\t');
        let (Some(id), Some(action), Some(timestamp), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err("expected 3 tab-separated fields".to_string());
        };

        let task_id = id
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid task id '{id}'"))?;
        let action = action
            .parse::<SessionAction>()
            .map_err(|err| err.to_string())?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|_| format!("invalid timestamp '{timestamp}'"))?
            .with_timezone(&Utc);

        Ok(Self::new(task_id, action, timestamp))
    }
}

/// Token that changes whenever the log file changes
///
/// Length plus modification time; a missing log has its own marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMarker {
    Missing,
    Present { len: u64, modified_nanos: u128 },
}

impl LogMarker {
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LogMarker::Missing),
            Err(err) => return Err(Error::Io(err)),
        };
        let modified_nanos = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or(0);
        Ok(LogMarker::Present {
            len: metadata.len(),
            modified_nanos,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &SessionEvent) -> Result<()> {
        lock::append_line_locked(&self.path, &event.to_line(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    /// Read every well-formed event in file order
    ///
    /// A missing log is empty. Malformed lines are skipped with a warning.
    pub fn read(&self) -> Result<Vec<SessionEvent>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };
        Ok(parse_events(&self.path, &content))
    }

    pub fn marker(&self) -> Result<LogMarker> {
        LogMarker::of(&self.path)
    }
}

pub fn parse_events(path: &Path, content: &str) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match SessionEvent::parse_line(line) {
            Ok(event) => events.push(event),
            Err(message) => {
                warn!(
                    path = %path.display(),
                    line = idx + 1,
                    "skipping malformed session event: {message}"
                );
            }
        }
    }
    events
}
