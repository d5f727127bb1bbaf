//! Task table for tasktime.
//!
//! Tasks live in `<home>/tasks.tsv`: a header carrying the id high-water
//! mark, then one tab-separated row per task. Every mutation is a
//! read-modify-write under the table lock, finished by an atomic replace.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;

const TABLE_HEADER_PREFIX: &str = "# tasktime tasks v1";
const NEXT_ID_KEY: &str = "next_id=";
const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M";
const FIELD_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(Error::InvalidArgument(format!(
                "unknown status '{other}' (expected pending|completed)"
            ))),
        }
    }
}

/// Recurrence class; decides which cron fields are wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn is_recurring(self) -> bool {
        self != Recurrence::None
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(Error::InvalidArgument(format!(
                "unknown recurrence '{other}' (expected none|daily|weekly|monthly)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub description: String,
    /// Deadline as stored; parsed lazily with [`Task::deadline_at`]
    pub deadline: String,
    pub priority: u32,
    pub recurrence: Recurrence,
    pub status: TaskStatus,
}

impl Task {
    /// Deadline as a local wall-clock timestamp
    pub fn deadline_at(&self) -> Result<NaiveDateTime> {
        parse_deadline(&self.deadline)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Fields accepted by `add`
#[derive(Debug, Clone)]
pub struct NewTask {
    pub description: String,
    pub deadline: NaiveDateTime,
    pub priority: u32,
    pub recurrence: Recurrence,
}

/// A single validated field change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    Description(String),
    Deadline(NaiveDateTime),
    Priority(u32),
    Recurrence(Recurrence),
}

impl TaskUpdate {
    pub const FIELDS: [&'static str; 4] = ["description", "deadline", "priority", "recurrence"];

    /// Build an update from a field name and raw value
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        match field.trim().to_ascii_lowercase().as_str() {
            "description" => Ok(TaskUpdate::Description(validate_description(value)?)),
            "deadline" => Ok(TaskUpdate::Deadline(parse_deadline(value)?)),
            "priority" => Ok(TaskUpdate::Priority(parse_priority(value)?)),
            "recurrence" => Ok(TaskUpdate::Recurrence(value.parse()?)),
            other => Err(Error::InvalidArgument(format!(
                "unknown field '{other}' (expected one of: {})",
                Self::FIELDS.join(", ")
            ))),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            TaskUpdate::Description(_) => "description",
            TaskUpdate::Deadline(_) => "deadline",
            TaskUpdate::Priority(_) => "priority",
            TaskUpdate::Recurrence(_) => "recurrence",
        }
    }

    fn apply(self, task: &mut Task) {
        match self {
            TaskUpdate::Description(value) => task.description = value,
            TaskUpdate::Deadline(value) => task.deadline = format_deadline(&value),
            TaskUpdate::Priority(value) => task.priority = value,
            TaskUpdate::Recurrence(value) => task.recurrence = value,
        }
    }
}

// =============================================================================
// Field parsing
// =============================================================================

/// Parse a deadline into local wall-clock time
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]`, RFC 3339 and a
/// bare `YYYY-MM-DD` (midnight).
pub fn parse_deadline(input: &str) -> Result<NaiveDateTime> {
    let value = input.trim();
    if value.is_empty() {
        return Err(Error::InvalidArgument("deadline cannot be empty".to_string()));
    }

    for format in [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Local).naive_local());
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(Error::InvalidArgument(format!(
        "invalid deadline '{value}' (expected YYYY-MM-DD HH:MM)"
    )))
}

pub fn format_deadline(deadline: &NaiveDateTime) -> String {
    deadline.format(DEADLINE_FORMAT).to_string()
}

pub fn parse_priority(input: &str) -> Result<u32> {
    match input.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::InvalidArgument(format!(
            "priority must be a positive integer, got '{}'",
            input.trim()
        ))),
    }
}

pub fn validate_description(input: &str) -> Result<String> {
    let value = input.trim();
    if value.is_empty() {
        return Err(Error::InvalidArgument(
            "description cannot be empty".to_string(),
        ));
    }
    Ok(value.to_string())
}

fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// =============================================================================
// Table format
// =============================================================================

/// In-memory form of `tasks.tsv`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTable {
    /// Smallest id the next `add` may use
    pub next_id: u64,
    pub tasks: Vec<Task>,
}

impl TaskTable {
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut table = TaskTable::default();
        let mut header_next_id = None;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix(TABLE_HEADER_PREFIX) {
                header_next_id = parse_header(rest).map_err(|message| Error::InvalidData {
                    path: path.to_path_buf(),
                    line: line_no,
                    message,
                })?;
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let task = parse_row(line).map_err(|message| Error::InvalidData {
                path: path.to_path_buf(),
                line: line_no,
                message,
            })?;
            if table.tasks.iter().any(|existing| existing.id == task.id) {
                return Err(Error::InvalidData {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: format!("duplicate task id {}", task.id),
                });
            }
            table.tasks.push(task);
        }

        let max_row = table.tasks.iter().map(|task| task.id.saturating_add(1)).max().unwrap_or(0);
        table.next_id = header_next_id.unwrap_or(0).max(max_row);
        Ok(table)
    }

    pub fn render(&self) -> String {
        let mut out = format!("{TABLE_HEADER_PREFIX} {NEXT_ID_KEY}{}\n", self.next_id);
        for task in &self.tasks {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\n",
                task.id,
                escape_field(&task.description),
                escape_field(&task.deadline),
                task.priority,
                task.recurrence,
                task.status,
            ));
        }
        out
    }

    /// Allocate an id from the clock, never below the high-water mark
    pub fn allocate_id(&mut self, now: DateTime<Utc>) -> u64 {
        let clock = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let id = clock.max(self.next_id);
        self.next_id = id.saturating_add(1);
        id
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    fn get_mut(&mut self, id: u64) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(Error::TaskNotFound(id))
    }
}

fn parse_header(rest: &str) -> std::result::Result<Option<u64>, String> {
    for token in rest.split_whitespace() {
        if let Some(value) = token.strip_prefix(NEXT_ID_KEY) {
            return value
                .parse::<u64>()
                .map(Some)
                .map_err(|_| format!("invalid next_id '{value}'"));
        }
    }
    Ok(None)
}

fn parse_row(line: &str) -> std::result::Result<Task, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!(
            "expected {FIELD_COUNT} tab-separated fields, found {}",
            fields.len()
        ));
    }

    let id = fields[0]
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid task id '{}'", fields[0]))?;
    let priority = parse_priority(fields[3]).map_err(|err| err.to_string())?;
    let recurrence = fields[4]
        .parse::<Recurrence>()
        .map_err(|err| err.to_string())?;
    let status = fields[5]
        .parse::<TaskStatus>()
        .map_err(|err| err.to_string())?;

    Ok(Task {
        id,
        description: unescape_field(fields[1]),
        deadline: unescape_field(fields[2]),
        priority,
        recurrence,
        status,
    })
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct TaskStore {
    storage: Storage,
}

impl TaskStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn path(&self) -> PathBuf {
        self.storage.tasks_file()
    }

    pub fn load(&self) -> Result<TaskTable> {
        let path = self.path();
        if !path.exists() {
            return Ok(TaskTable::default());
        }
        let content = std::fs::read_to_string(&path)?;
        TaskTable::parse(&path, &content)
    }

    pub fn list(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let mut tasks = self.load()?.tasks;
        if let Some(status) = status {
            tasks.retain(|task| task.status == status);
        }
        Ok(tasks)
    }

    pub fn get(&self, id: u64) -> Result<Task> {
        self.load()?
            .get(id)
            .cloned()
            .ok_or(Error::TaskNotFound(id))
    }

    pub fn add(&self, new_task: NewTask) -> Result<Task> {
        let description = validate_description(&new_task.description)?;
        if new_task.priority == 0 {
            return Err(Error::InvalidArgument(
                "priority must be a positive integer, got '0'".to_string(),
            ));
        }

        self.mutate(|table| {
            let id = table.allocate_id(Utc::now());
            let task = Task {
                id,
                description,
                deadline: format_deadline(&new_task.deadline),
                priority: new_task.priority,
                recurrence: new_task.recurrence,
                status: TaskStatus::Pending,
            };
            table.tasks.push(task.clone());
            Ok(task)
        })
    }

    pub fn update(&self, id: u64, update: TaskUpdate) -> Result<Task> {
        self.mutate(|table| {
            let task = table.get_mut(id)?;
            update.apply(task);
            Ok(task.clone())
        })
    }

    /// Remove a task row; its session events stay in the log
    pub fn delete(&self, id: u64) -> Result<Task> {
        self.mutate(|table| {
            let index = table
                .tasks
                .iter()
                .position(|task| task.id == id)
                .ok_or(Error::TaskNotFound(id))?;
            Ok(table.tasks.remove(index))
        })
    }

    /// Mark a task completed; completing twice is a no-op
    pub fn complete(&self, id: u64) -> Result<Task> {
        self.set_status(id, TaskStatus::Completed)
    }

    pub fn set_status(&self, id: u64, status: TaskStatus) -> Result<Task> {
        self.mutate(|table| {
            let task = table.get_mut(id)?;
            task.status = status;
            Ok(task.clone())
        })
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut TaskTable) -> Result<T>) -> Result<T> {
        self.storage.ensure_home()?;
        let path = self.path();
        let _lock = FileLock::acquire(lock::lock_path_for(&path), DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut table = self.load()?;
        let result = apply(&mut table)?;
        lock::write_atomic(&path, table.render().as_bytes())?;
        Ok(result)
    }
}
