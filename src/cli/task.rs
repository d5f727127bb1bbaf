//! tasktime task table commands: add, list, show, update, delete.

use chrono::Utc;
use serde::Serialize;

use crate::cache::DurationCache;
use crate::cli::Context;
use crate::error::Result;
use crate::output::{emit_success, format_duration, HumanOutput, OutputOptions};
use crate::session::EventLog;
use crate::task::{parse_deadline, NewTask, Recurrence, Task, TaskStatus, TaskStore, TaskUpdate};

pub struct AddOptions {
    pub description: String,
    pub deadline: String,
    pub priority: u32,
    pub recurrence: String,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: u64,
    pub json: bool,
    pub quiet: bool,
}

pub struct UpdateOptions {
    pub id: u64,
    pub field: String,
    pub value: String,
    pub json: bool,
    pub quiet: bool,
}

pub struct DeleteOptions {
    pub id: u64,
    pub json: bool,
    pub quiet: bool,
}

/// A task with its accumulated time
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub duration_secs: u64,
    pub running: bool,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct TaskUpdatedOutput<'a> {
    field: &'a str,
    task: &'a Task,
}

pub(crate) fn duration_cache(ctx: &Context) -> DurationCache<EventLog> {
    DurationCache::new(
        EventLog::new(ctx.storage.sessions_file()),
        ctx.config.sessions.double_start,
    )
}

pub(crate) fn task_line(view: &TaskView) -> String {
    let task = &view.task;
    let mut line = format!(
        "[{}][p{}] {} {} (due {}",
        task.status, task.priority, task.id, task.description, task.deadline
    );
    if task.recurrence.is_recurring() {
        line.push_str(&format!(", {}", task.recurrence));
    }
    line.push_str(&format!(") {}", format_duration(view.duration_secs)));
    if view.running {
        line.push_str(" running");
    }
    line
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let deadline = parse_deadline(&options.deadline)?;
    let recurrence: Recurrence = options.recurrence.parse()?;
    let store = TaskStore::new(ctx.storage.clone());

    let task = store.add(NewTask {
        description: options.description,
        deadline,
        priority: options.priority,
        recurrence,
    })?;

    let mut human = HumanOutput::new("Task created");
    human.field("ID", task.id.to_string());
    human.field("Description", task.description.clone());
    human.field("Deadline", task.deadline.clone());
    human.field("Priority", task.priority.to_string());
    human.field("Recurrence", task.recurrence.to_string());
    if task.recurrence.is_recurring() {
        human.hint("tasktime schedule");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "add",
        &task,
        Some(&human),
    )
}

pub fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let status = options
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    let tasks = TaskStore::new(ctx.storage.clone()).list(status)?;

    let now = Utc::now();
    let mut cache = duration_cache(ctx);
    let mut views = Vec::with_capacity(tasks.len());
    for task in tasks {
        let duration_secs = cache.get_duration(task.id, now)?;
        let running = cache.is_running(task.id)?;
        views.push(TaskView {
            task,
            duration_secs,
            running,
        });
    }

    let mut human = HumanOutput::new("Tasks");
    human.field("Total", views.len().to_string());
    if let Some(status) = status {
        human.field("Status", status.to_string());
    }
    for view in &views {
        human.row(task_line(view));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "list",
        &TaskListOutput {
            total: views.len(),
            tasks: views,
        },
        Some(&human),
    )
}

pub fn run_show(ctx: &Context, options: ShowOptions) -> Result<()> {
    let task = TaskStore::new(ctx.storage.clone()).get(options.id)?;
    let mut cache = duration_cache(ctx);
    let view = TaskView {
        duration_secs: cache.get_duration(task.id, Utc::now())?,
        running: cache.is_running(task.id)?,
        task,
    };

    let mut human = HumanOutput::new(format!("Task {}", view.task.id));
    human.field("Description", view.task.description.clone());
    human.field("Deadline", view.task.deadline.clone());
    human.field("Priority", view.task.priority.to_string());
    human.field("Recurrence", view.task.recurrence.to_string());
    human.field("Status", view.task.status.to_string());
    human.field("Time", format_duration(view.duration_secs));
    if view.running {
        human.field("Session", "running");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "show",
        &view,
        Some(&human),
    )
}

pub fn run_update(ctx: &Context, options: UpdateOptions) -> Result<()> {
    let update = TaskUpdate::parse(&options.field, &options.value)?;
    let field = update.field();
    let task = TaskStore::new(ctx.storage.clone()).update(options.id, update)?;

    let mut human = HumanOutput::new(format!("Task {} updated", task.id));
    human.field("Field", field);
    human.field("Description", task.description.clone());
    human.field("Deadline", task.deadline.clone());
    human.field("Priority", task.priority.to_string());
    human.field("Recurrence", task.recurrence.to_string());
    if matches!(field, "deadline" | "priority" | "recurrence") {
        human.hint("tasktime schedule");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "update",
        &TaskUpdatedOutput { field, task: &task },
        Some(&human),
    )
}

pub fn run_delete(ctx: &Context, options: DeleteOptions) -> Result<()> {
    let task = TaskStore::new(ctx.storage.clone()).delete(options.id)?;

    let mut human = HumanOutput::new(format!("Task {} deleted", task.id));
    human.field("Description", task.description.clone());
    if task.recurrence.is_recurring() {
        human.hint("tasktime schedule");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "delete",
        &task,
        Some(&human),
    )
}
