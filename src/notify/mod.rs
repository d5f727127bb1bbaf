//! Session notifications: quiet-hours gate, per-category throttle and
//! pluggable transports.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NotifyConfig;
use crate::error::Result;
use crate::storage::Storage;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::DesktopNotifier;

/// Set to any value to force the no-op transport
pub const DISABLE_ENV: &str = "TASKTIME_DISABLE_NOTIFICATIONS";

// =============================================================================
// Quiet hours
// =============================================================================

/// `[start, end)` window in minutes of the day; may wrap midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: u32,
    pub end: u32,
}

impl QuietHours {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM` into a minute of the day
    pub fn parse_minute(value: &str) -> std::result::Result<u32, String> {
        let (hour, minute) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{value}'"))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| format!("invalid hour in '{value}'"))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| format!("invalid minute in '{value}'"))?;
        if hour > 23 || minute > 59 {
            return Err(format!("time out of range: '{value}'"));
        }
        Ok(hour * 60 + minute)
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        in_quiet_hours(minute_of_day, self.start, self.end)
    }
}

/// Whether `now` falls in the `[start, end)` window, all in minutes of the day
///
/// A window with `start >= end` wraps midnight; equal bounds cover the
/// whole day.
pub fn in_quiet_hours(now: u32, start: u32, end: u32) -> bool {
    if start < end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

// =============================================================================
// Throttle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SessionStart,
    SessionPause,
    SessionEnd,
    Reminder,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::SessionStart => "session_start",
            Category::SessionPause => "session_pause",
            Category::SessionEnd => "session_end",
            Category::Reminder => "reminder",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Throttled { remaining_secs: i64 },
    QuietHours,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Last-fired timestamps, persisted between invocations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleState {
    #[serde(default)]
    pub last_fired: BTreeMap<Category, DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    quiet: Option<QuietHours>,
    state: ThrottleState,
}

impl Throttle {
    pub fn new(interval_secs: u64, quiet: Option<QuietHours>) -> Self {
        Self::with_state(interval_secs, quiet, ThrottleState::default())
    }

    pub fn with_state(interval_secs: u64, quiet: Option<QuietHours>, state: ThrottleState) -> Self {
        let secs = i64::try_from(interval_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let interval = Duration::seconds(secs);
        Self {
            interval,
            quiet,
            state,
        }
    }

    pub fn state(&self) -> &ThrottleState {
        &self.state
    }

    /// Decide whether to deliver `category` at `now`
    ///
    /// A throttled call leaves the state untouched. A call past the interval
    /// records `now` as last-fired even when quiet hours then suppress it.
    /// A last-fired time later than `now` (clock stepped back, state copied
    /// from another machine) is stale and gets overwritten.
    pub fn should_notify(&mut self, category: Category, now: DateTime<Local>) -> Decision {
        let now_utc = now.with_timezone(&Utc);
        if let Some(last) = self.state.last_fired.get(&category) {
            let elapsed = now_utc.signed_duration_since(*last);
            if elapsed >= Duration::zero() && elapsed < self.interval {
                let remaining = self
                    .interval
                    .checked_sub(&elapsed)
                    .unwrap_or(self.interval);
                return Decision::Throttled {
                    remaining_secs: remaining.num_seconds(),
                };
            }
        }

        self.state.last_fired.insert(category, now_utc);

        let minute_of_day = now.hour() * 60 + now.minute();
        match self.quiet {
            Some(quiet) if quiet.contains(minute_of_day) => Decision::QuietHours,
            _ => Decision::Allow,
        }
    }
}

// =============================================================================
// Transports
// =============================================================================

pub trait Notifier {
    fn name(&self) -> &'static str;
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn name(&self) -> &'static str {
        "none"
    }

    fn notify(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

pub fn disabled_by_env() -> bool {
    std::env::var_os(DISABLE_ENV).is_some()
}

/// Transport chosen by configuration and environment
pub fn notifier_from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
    if disabled_by_env() || !config.enabled || !config.desktop {
        return Box::new(NoopNotifier);
    }
    platform_notifier()
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Box<dyn Notifier> {
    Box::new(DesktopNotifier)
}

#[cfg(not(target_os = "linux"))]
pub fn platform_notifier() -> Box<dyn Notifier> {
    Box::new(NoopNotifier)
}

// =============================================================================
// Dispatch
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AlertOutcome {
    pub category: Category,
    #[serde(flatten)]
    pub decision: Decision,
    pub transport: &'static str,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Throttle plus transport, with optional state persistence
pub struct Alerts {
    throttle: Throttle,
    notifier: Box<dyn Notifier>,
    storage: Storage,
    state_path: Option<PathBuf>,
}

impl Alerts {
    pub fn new(throttle: Throttle, notifier: Box<dyn Notifier>, storage: Storage) -> Self {
        Self {
            throttle,
            notifier,
            storage,
            state_path: None,
        }
    }

    /// Build from config; loads persisted throttle state when enabled
    pub fn from_config(config: &NotifyConfig, storage: &Storage) -> Result<Self> {
        let quiet = config.quiet_hours()?;
        let state_path = config
            .persist_throttle
            .then(|| storage.notify_state_file());

        let state = match &state_path {
            Some(path) => match storage.read_json::<ThrottleState>(path) {
                Ok(state) => state.unwrap_or_default(),
                Err(err) => {
                    warn!(path = %path.display(), "ignoring unreadable throttle state: {err}");
                    ThrottleState::default()
                }
            },
            None => ThrottleState::default(),
        };

        Ok(Self {
            throttle: Throttle::with_state(config.throttle_secs, quiet, state),
            notifier: notifier_from_config(config),
            storage: storage.clone(),
            state_path,
        })
    }

    /// Throttle, then deliver; transport and state failures are warnings
    pub fn send(
        &mut self,
        category: Category,
        title: &str,
        body: &str,
        now: DateTime<Local>,
    ) -> AlertOutcome {
        let decision = self.throttle.should_notify(category, now);
        let mut outcome = AlertOutcome {
            category,
            decision,
            transport: self.notifier.name(),
            delivered: false,
            warning: None,
        };

        if !matches!(decision, Decision::Throttled { .. }) {
            self.persist_state(&mut outcome);
        }

        if decision.is_allowed() {
            match self.notifier.notify(title, body) {
                Ok(()) => outcome.delivered = true,
                Err(err) => {
                    warn!(category = %category, transport = outcome.transport, "notification failed: {err}");
                    outcome.warning = Some(format!("notification failed: {err}"));
                }
            }
        } else {
            debug!(category = %category, ?decision, "notification suppressed");
        }
        outcome
    }

    fn persist_state(&self, outcome: &mut AlertOutcome) {
        let Some(path) = &self.state_path else {
            return;
        };
        if let Err(err) = self.storage.write_json(path, self.throttle.state()) {
            warn!(path = %path.display(), "failed to save throttle state: {err}");
            outcome.warning = Some(format!("failed to save throttle state: {err}"));
        }
    }
}
