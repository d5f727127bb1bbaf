//! Duration accounting over session events.
//!
//! Active intervals are rebuilt from start/pause/end events in file order.
//! A start still open at the end of the scan counts until `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{SessionAction, SessionEvent};

/// Handling of a start that arrives while an interval is already open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// The later start replaces the open one; the earlier interval is dropped
    #[default]
    Discard,
    /// The earlier open start is kept; time runs on across the duplicate
    Merge,
}

/// Running total for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskTally {
    /// Seconds from closed intervals
    pub closed_secs: u64,
    /// Start of the interval still awaiting pause or end
    pub open_since: Option<DateTime<Utc>>,
}

impl TaskTally {
    pub fn apply(&mut self, event: &SessionEvent, policy: OverlapPolicy) {
        match event.action {
            SessionAction::Start => match (self.open_since, policy) {
                (Some(_), OverlapPolicy::Merge) => {}
                _ => self.open_since = Some(event.timestamp),
            },
            SessionAction::Pause | SessionAction::End => {
                if let Some(start) = self.open_since.take() {
                    self.closed_secs += gap_secs(start, event.timestamp);
                }
            }
        }
    }

    /// Total seconds with an open interval counted up to `now`
    pub fn seconds_at(&self, now: DateTime<Utc>) -> u64 {
        let open = self
            .open_since
            .map(|start| gap_secs(start, now))
            .unwrap_or(0);
        self.closed_secs + open
    }

    pub fn is_running(&self) -> bool {
        self.open_since.is_some()
    }
}

fn gap_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_seconds()).unwrap_or(0)
}

/// Accumulated seconds for one task
pub fn compute_duration(
    task_id: u64,
    events: &[SessionEvent],
    now: DateTime<Utc>,
    policy: OverlapPolicy,
) -> u64 {
    let mut tally = TaskTally::default();
    for event in events.iter().filter(|event| event.task_id == task_id) {
        tally.apply(event, policy);
    }
    tally.seconds_at(now)
}

/// Tallies for every task that appears in `events`, in one pass
pub fn compute_all(events: &[SessionEvent], policy: OverlapPolicy) -> BTreeMap<u64, TaskTally> {
    let mut tallies: BTreeMap<u64, TaskTally> = BTreeMap::new();
    for event in events {
        tallies.entry(event.task_id).or_default().apply(event, policy);
    }
    tallies
}
