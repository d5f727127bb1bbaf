//! Configuration loading and management
//!
//! Handles parsing of `tasktime.toml` in the tasktime home directory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::accounting::OverlapPolicy;
use crate::error::{Error, Result};
use crate::notify::QuietHours;
use crate::schedule::PriorityOrder;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Notification throttling and quiet hours
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Recurring schedule generation
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Session accounting
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Master switch for all notification transports
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Use the desktop transport when available
    #[serde(default = "default_true")]
    pub desktop: bool,

    /// Minimum seconds between two notifications of the same category
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,

    /// Start of the quiet window, `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_start: Option<String>,

    /// End of the quiet window (exclusive), `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_end: Option<String>,

    /// Keep last-fired times across invocations
    #[serde(default = "default_true")]
    pub persist_throttle: bool,
}

fn default_true() -> bool {
    true
}

fn default_throttle_secs() -> u64 {
    30
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desktop: true,
            throttle_secs: default_throttle_secs(),
            quiet_start: None,
            quiet_end: None,
            persist_throttle: true,
        }
    }
}

/// Schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Which priority value wins a slot collision: "higher" or "lower"
    #[serde(default)]
    pub priority_wins: PriorityOrder,

    /// Command template for generated jobs; `{id}` is the task id
    #[serde(default = "default_command")]
    pub command: String,

    /// Marker tagging generated crontab lines
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_command() -> String {
    "tasktime remind {id}".to_string()
}

fn default_marker() -> String {
    "tasktime".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            priority_wins: PriorityOrder::default(),
            command: default_command(),
            marker: default_marker(),
        }
    }
}

/// Session accounting configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Handling of a second start without a pause/end: "discard" or "merge"
    #[serde(default)]
    pub double_start: OverlapPolicy,
}

impl Config {
    /// Load and validate configuration from a file
    ///
    /// Parse failures, unknown enum values included, are configuration
    /// errors naming the file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or return defaults when it is absent
    ///
    /// A file that exists but does not validate is an error, never silently
    /// replaced by defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        self.notify.validate()?;
        self.schedule.validate()?;
        Ok(())
    }
}

impl NotifyConfig {
    /// Parsed quiet window, if configured
    pub fn quiet_hours(&self) -> Result<Option<QuietHours>> {
        match (self.quiet_start.as_deref(), self.quiet_end.as_deref()) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = QuietHours::parse_minute(start).map_err(|err| {
                    Error::InvalidConfig(format!("notify.quiet_start: {err}"))
                })?;
                let end = QuietHours::parse_minute(end)
                    .map_err(|err| Error::InvalidConfig(format!("notify.quiet_end: {err}")))?;
                Ok(Some(QuietHours::new(start, end)))
            }
            _ => Err(Error::InvalidConfig(
                "notify.quiet_start and notify.quiet_end must be set together".to_string(),
            )),
        }
    }

    fn validate(&self) -> Result<()> {
        self.quiet_hours()?;
        Ok(())
    }
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "schedule.command cannot be empty".to_string(),
            ));
        }
        if self.command.contains('\n') || self.command.contains('%') {
            return Err(Error::InvalidConfig(
                "schedule.command cannot contain newlines or '%'".to_string(),
            ));
        }

        let marker = self.marker.trim();
        if marker.is_empty() {
            return Err(Error::InvalidConfig(
                "schedule.marker cannot be empty".to_string(),
            ));
        }
        if !marker
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(Error::InvalidConfig(
                "schedule.marker must be alphanumeric, '-' or '_'".to_string(),
            ));
        }
        Ok(())
    }
}
