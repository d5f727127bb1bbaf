//! tasktime - task time tracking library
//!
//! Core of the tasktime CLI: session accounting, recurring schedules and
//! throttled notifications over a plain-text task table and event log.
//!
//! # Core Concepts
//!
//! - **Sessions**: start/pause/end events appended to `sessions.log`
//! - **Accounting**: active intervals rebuilt from events, cached on the
//!   log's freshness marker
//! - **Schedules**: recurring tasks mapped to distinct cron slots
//! - **Notifications**: per-category throttle plus quiet hours
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `tasktime.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task table (`tasks.tsv`)
//! - `session`: Session event log (`sessions.log`)
//! - `accounting`: Duration reconstruction from events
//! - `cache`: Duration cache keyed on the log marker
//! - `schedule`: Slot assignment for recurring tasks
//! - `crontab`: Job table install
//! - `notify`: Quiet hours, throttle and transports
//! - `capability`: Startup probe for external tools
//! - `storage`: Home directory layout
//! - `lock`: File locking and atomic writes

pub mod accounting;
pub mod cache;
pub mod capability;
pub mod cli;
pub mod config;
pub mod crontab;
pub mod error;
pub mod lock;
pub mod notify;
pub mod output;
pub mod schedule;
pub mod session;
pub mod storage;
pub mod task;

pub use error::{Error, Result};
