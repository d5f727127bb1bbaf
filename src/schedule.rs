//! Recurring-task slot assignment.
//!
//! Each recurring task maps to a five-field cron slot derived from its
//! deadline. Collisions walk the candidate forward one minute at a time;
//! a strictly more urgent candidate takes the slot and the displaced
//! claimant continues the walk from the next minute.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::task::{Recurrence, Task};

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Which priority value wins a slot collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    /// Larger numbers are more urgent
    #[default]
    Higher,
    /// Smaller numbers are more urgent
    Lower,
}

impl PriorityOrder {
    /// `holder` is at least as urgent as `candidate`
    pub fn holds_against(self, holder: u32, candidate: u32) -> bool {
        match self {
            PriorityOrder::Higher => holder >= candidate,
            PriorityOrder::Lower => holder <= candidate,
        }
    }
}

/// Five-field cron slot; month is always a wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot {
    pub minute: u32,
    pub hour: u32,
    pub day_of_month: Option<u32>,
    /// 0 = Sunday, as cron counts
    pub weekday: Option<u32>,
}

impl Slot {
    /// Natural slot for a task, or why it has none
    pub fn for_task(task: &Task) -> Result<Self> {
        let deadline = task.deadline_at()?;
        let (day_of_month, weekday) = match task.recurrence {
            Recurrence::Daily => (None, None),
            Recurrence::Weekly => (None, Some(deadline.weekday().num_days_from_sunday())),
            Recurrence::Monthly => (Some(deadline.day()), None),
            Recurrence::None => {
                return Err(Error::InvalidArgument(format!(
                    "task {} does not recur",
                    task.id
                )))
            }
        };
        Ok(Slot {
            minute: deadline.minute(),
            hour: deadline.hour(),
            day_of_month,
            weekday,
        })
    }

    /// The slot `steps` minutes later, same day key
    ///
    /// Minutes wrap within the hour; each full wrap carries into the next
    /// hour.
    fn advanced(self, steps: u32) -> Self {
        let minute = (self.minute + steps % MINUTES_PER_HOUR) % MINUTES_PER_HOUR;
        let hour = (self.hour + steps / MINUTES_PER_HOUR) % 24;
        Slot {
            minute,
            hour,
            ..self
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |value: Option<u32>| value.map_or_else(|| "*".to_string(), |v| v.to_string());
        write!(
            f,
            "{} {} {} * {}",
            self.minute,
            self.hour,
            field(self.day_of_month),
            field(self.weekday)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEntry {
    pub slot: Slot,
    pub task_id: u64,
    pub command: String,
}

impl JobEntry {
    /// Crontab line tagged with `marker`
    pub fn to_crontab_line(&self, marker: &str) -> String {
        format!(
            "{} {} # {} task={}",
            self.slot, self.command, marker, self.task_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// In processing order: deadline ascending, then id
    pub entries: Vec<JobEntry>,
    pub skipped: Vec<SkippedTask>,
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    task_id: u64,
    priority: u32,
}

pub fn render_command(template: &str, task_id: u64) -> String {
    template.replace("{id}", &task_id.to_string())
}

/// Map recurring tasks onto distinct cron slots
pub fn assign_slots(tasks: &[Task], order: PriorityOrder, command: &str) -> Result<Assignment> {
    let mut assignment = Assignment::default();
    let mut queue = Vec::new();

    for task in tasks.iter().filter(|task| task.recurrence.is_recurring()) {
        match task.deadline_at().and_then(|deadline| Ok((deadline, Slot::for_task(task)?))) {
            Ok((deadline, slot)) => queue.push((deadline, task, slot)),
            Err(err) => {
                warn!(task_id = task.id, "skipping task with unusable deadline: {err}");
                assignment.skipped.push(SkippedTask {
                    task_id: task.id,
                    reason: err.to_string(),
                });
            }
        }
    }
    queue.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

    let mut claims: BTreeMap<Slot, Claim> = BTreeMap::new();
    for (_, task, slot) in &queue {
        let claim = Claim {
            task_id: task.id,
            priority: task.priority,
        };
        place(&mut claims, claim, *slot, order)?;
    }

    let placed: HashMap<u64, Slot> = claims
        .iter()
        .map(|(slot, claim)| (claim.task_id, *slot))
        .collect();
    for (_, task, _) in &queue {
        let slot = placed.get(&task.id).copied().ok_or_else(|| {
            Error::OperationFailed(format!("task {} lost its slot", task.id))
        })?;
        assignment.entries.push(JobEntry {
            slot,
            task_id: task.id,
            command: render_command(command, task.id),
        });
    }
    Ok(assignment)
}

fn place(
    claims: &mut BTreeMap<Slot, Claim>,
    mut claim: Claim,
    mut base: Slot,
    order: PriorityOrder,
) -> Result<()> {
    let mut steps = 0;
    loop {
        if steps >= MINUTES_PER_DAY {
            return Err(Error::OperationFailed(format!(
                "no free slot left for task {}",
                claim.task_id
            )));
        }
        let key = base.advanced(steps);
        match claims.get_mut(&key) {
            None => {
                claims.insert(key, claim);
                return Ok(());
            }
            Some(holder) if order.holds_against(holder.priority, claim.priority) => {
                steps += 1;
            }
            Some(holder) => {
                debug!(
                    slot = %key,
                    task_id = claim.task_id,
                    displaced = holder.task_id,
                    "slot taken over"
                );
                claim = std::mem::replace(holder, claim);
                base = key;
                steps = 1;
            }
        }
    }
}
