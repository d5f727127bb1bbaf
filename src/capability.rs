//! Startup capability probe.
//!
//! A missing external tool is reported once here; only the command that
//! needs it fails.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::config::NotifyConfig;
use crate::crontab::{CRONTAB_BIN, CRONTAB_FILE_ENV};
use crate::notify;

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// `crontab` binary, when found
    pub crontab: Option<PathBuf>,
    /// File job table overriding the system crontab
    pub crontab_file: Option<PathBuf>,
    /// Transport notifications will use
    pub notifier: &'static str,
}

impl Capabilities {
    pub fn probe(config: &NotifyConfig) -> Self {
        let crontab_file = std::env::var_os(CRONTAB_FILE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let crontab = which::which(CRONTAB_BIN).ok();
        debug!(?crontab, ?crontab_file, "capabilities probed");
        Self {
            crontab,
            crontab_file,
            notifier: notify::notifier_from_config(config).name(),
        }
    }

    /// Scheduling can install somewhere
    pub fn can_schedule(&self) -> bool {
        self.crontab.is_some() || self.crontab_file.is_some()
    }

    /// One line per missing dependency, for the startup report
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.can_schedule() {
            missing.push(format!(
                "{CRONTAB_BIN} not found in PATH; `tasktime schedule` will fail until it is installed or {CRONTAB_FILE_ENV} is set"
            ));
        }
        missing
    }
}
