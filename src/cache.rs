//! Duration cache keyed on the event log's freshness marker.
//!
//! The whole snapshot is rebuilt whenever the marker moves; there is no
//! per-task invalidation. Open intervals are stored by start time so a
//! cached snapshot still reports live totals for running tasks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::accounting::{self, OverlapPolicy, TaskTally};
use crate::error::Result;
use crate::session::{EventLog, LogMarker, SessionEvent};

const MAX_SCAN_ATTEMPTS: usize = 3;

/// Anything that can report a freshness marker and load events
pub trait EventSource {
    fn marker(&self) -> Result<LogMarker>;
    fn load(&self) -> Result<Vec<SessionEvent>>;
}

impl EventSource for EventLog {
    fn marker(&self) -> Result<LogMarker> {
        EventLog::marker(self)
    }

    fn load(&self) -> Result<Vec<SessionEvent>> {
        self.read()
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    marker: LogMarker,
    tallies: BTreeMap<u64, TaskTally>,
}

pub struct DurationCache<S> {
    source: S,
    policy: OverlapPolicy,
    snapshot: Option<Snapshot>,
}

impl<S: EventSource> DurationCache<S> {
    pub fn new(source: S, policy: OverlapPolicy) -> Self {
        Self {
            source,
            policy,
            snapshot: None,
        }
    }

    /// Accumulated seconds for `task_id`; 0 when it has no events
    pub fn get_duration(&mut self, task_id: u64, now: DateTime<Utc>) -> Result<u64> {
        let tallies = self.fresh()?;
        Ok(tallies
            .get(&task_id)
            .map(|tally| tally.seconds_at(now))
            .unwrap_or(0))
    }

    /// Seconds for every task seen in the log
    pub fn durations(&mut self, now: DateTime<Utc>) -> Result<BTreeMap<u64, u64>> {
        let tallies = self.fresh()?;
        Ok(tallies
            .iter()
            .map(|(task_id, tally)| (*task_id, tally.seconds_at(now)))
            .collect())
    }

    /// Whether `task_id` has an interval awaiting pause or end
    pub fn is_running(&mut self, task_id: u64) -> Result<bool> {
        let tallies = self.fresh()?;
        Ok(tallies
            .get(&task_id)
            .map(TaskTally::is_running)
            .unwrap_or(false))
    }

    fn fresh(&mut self) -> Result<&BTreeMap<u64, TaskTally>> {
        let current = self.source.marker()?;
        let snapshot = match self.snapshot.take() {
            Some(snapshot) if snapshot.marker == current => {
                debug!("duration cache hit");
                snapshot
            }
            _ => self.rebuild()?,
        };
        Ok(&self.snapshot.insert(snapshot).tallies)
    }

    fn rebuild(&self) -> Result<Snapshot> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let before = self.source.marker()?;
            let events = self.source.load()?;
            let after = self.source.marker()?;

            // A marker that moved mid-scan is recorded as `before`, so the
            // next query rebuilds again.
            if before == after || attempt >= MAX_SCAN_ATTEMPTS {
                debug!(events = events.len(), attempt, "duration cache rebuilt");
                return Ok(Snapshot {
                    marker: before,
                    tallies: accounting::compute_all(&events, self.policy),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionAction;
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// In-memory source counting full scans
    #[derive(Default)]
    struct CountingSource {
        events: RefCell<Vec<SessionEvent>>,
        version: Cell<u64>,
        loads: Cell<usize>,
    }

    impl CountingSource {
        fn push(&self, event: SessionEvent) {
            self.events.borrow_mut().push(event);
            self.version.set(self.version.get() + 1);
        }
    }

    impl EventSource for &CountingSource {
        fn marker(&self) -> Result<LogMarker> {
            Ok(LogMarker::Present {
                len: self.events.borrow().len() as u64,
                modified_nanos: u128::from(self.version.get()),
            })
        }

        fn load(&self) -> Result<Vec<SessionEvent>> {
            self.loads.set(self.loads.get() + 1);
            Ok(self.events.borrow().clone())
        }
    }

    #[test]
    fn repeated_queries_scan_once() {
        let source = CountingSource::default();
        source.push(SessionEvent::new(1, SessionAction::Start, at(0)));
        source.push(SessionEvent::new(1, SessionAction::Pause, at(90)));
        source.push(SessionEvent::new(2, SessionAction::Start, at(10)));

        let mut cache = DurationCache::new(&source, OverlapPolicy::Discard);
        assert_eq!(cache.get_duration(1, at(100)).unwrap(), 90);
        assert_eq!(cache.get_duration(2, at(100)).unwrap(), 90);
        assert_eq!(cache.get_duration(1, at(100)).unwrap(), 90);
        assert_eq!(source.loads.get(), 1);
    }

    #[test]
    fn append_invalidates_snapshot() {
        let source = CountingSource::default();
        source.push(SessionEvent::new(1, SessionAction::Start, at(0)));

        let mut cache = DurationCache::new(&source, OverlapPolicy::Discard);
        assert_eq!(cache.get_duration(1, at(30)).unwrap(), 30);

        source.push(SessionEvent::new(1, SessionAction::End, at(40)));
        assert_eq!(cache.get_duration(1, at(500)).unwrap(), 40);
        assert_eq!(source.loads.get(), 2);
    }

    #[test]
    fn running_task_reports_live_total_from_cache() {
        let source = CountingSource::default();
        source.push(SessionEvent::new(5, SessionAction::Start, at(0)));

        let mut cache = DurationCache::new(&source, OverlapPolicy::Discard);
        assert_eq!(cache.get_duration(5, at(10)).unwrap(), 10);
        assert_eq!(cache.get_duration(5, at(70)).unwrap(), 70);
        assert!(cache.is_running(5).unwrap());
        assert_eq!(source.loads.get(), 1);
    }

    #[test]
    fn unknown_task_is_zero() {
        let source = CountingSource::default();
        let mut cache = DurationCache::new(&source, OverlapPolicy::Discard);
        assert_eq!(cache.get_duration(99, at(0)).unwrap(), 0);
        assert!(cache.durations(at(0)).unwrap().is_empty());
    }

    /// Source whose marker moves during the next `churn` loads, as if a
    /// writer appended while the scan was running
    struct ChurningSource {
        version: Cell<u64>,
        churn: Cell<usize>,
        loads: Cell<usize>,
    }

    impl ChurningSource {
        fn new(churn: usize) -> Self {
            Self {
                version: Cell::new(0),
                churn: Cell::new(churn),
                loads: Cell::new(0),
            }
        }
    }

    impl EventSource for &ChurningSource {
        fn marker(&self) -> Result<LogMarker> {
            Ok(LogMarker::Present {
                len: 0,
                modified_nanos: u128::from(self.version.get()),
            })
        }

        fn load(&self) -> Result<Vec<SessionEvent>> {
            self.loads.set(self.loads.get() + 1);
            if self.churn.get() > 0 {
                self.churn.set(self.churn.get() - 1);
                self.version.set(self.version.get() + 1);
            }
            Ok(vec![SessionEvent::new(1, SessionAction::Start, at(0))])
        }
    }

    #[test]
    fn marker_moving_mid_scan_retries() {
        let source = ChurningSource::new(1);
        let mut cache = DurationCache::new(&source, OverlapPolicy::Discard);

        assert_eq!(cache.get_duration(1, at(10)).unwrap(), 10);
        assert_eq!(source.loads.get(), 2);

        // The settled marker was recorded, so this is a hit
        assert_eq!(cache.get_duration(1, at(20)).unwrap(), 20);
        assert_eq!(source.loads.get(), 2);
    }

    #[test]
    fn rescans_are_bounded_and_next_query_rebuilds() {
        let source = ChurningSource::new(usize::MAX);
        let mut cache = DurationCache::new(&source, OverlapPolicy::Discard);

        assert_eq!(cache.get_duration(1, at(10)).unwrap(), 10);
        assert_eq!(source.loads.get(), MAX_SCAN_ATTEMPTS);

        // The recorded marker predates the last scan, so it is stale
        assert_eq!(cache.get_duration(1, at(10)).unwrap(), 10);
        assert_eq!(source.loads.get(), 2 * MAX_SCAN_ATTEMPTS);
    }

    #[test]
    fn file_backed_cache_sees_appends() {
        let dir = tempdir().expect("tempdir");
        let log = EventLog::new(dir.path().join("sessions.log"));
        log.append(&SessionEvent::new(7, SessionAction::Start, at(0)))
            .expect("append");
        log.append(&SessionEvent::new(7, SessionAction::Pause, at(20)))
            .expect("append");

        let mut cache = DurationCache::new(log.clone(), OverlapPolicy::Discard);
        assert_eq!(cache.get_duration(7, at(1_000)).unwrap(), 20);

        log.append(&SessionEvent::new(7, SessionAction::Start, at(100)))
            .expect("append");
        log.append(&SessionEvent::new(7, SessionAction::End, at(125)))
            .expect("append");
        assert_eq!(cache.get_duration(7, at(1_000)).unwrap(), 45);
    }

    #[test]
    fn unreadable_log_is_an_error() {
        let dir = tempdir().expect("tempdir");
        // A directory where the log should be cannot be read as text
        let path = dir.path().join("sessions.log");
        std::fs::create_dir(&path).expect("mkdir");

        let mut cache = DurationCache::new(EventLog::new(path), OverlapPolicy::Discard);
        assert!(cache.get_duration(1, at(0)).is_err());
    }
}
