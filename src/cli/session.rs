//! tasktime session commands: start, pause, end, report, remind.

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::warn;

use crate::cli::task::{duration_cache, task_line, TaskView};
use crate::cli::Context;
use crate::error::{Error, Result};
use crate::notify::{AlertOutcome, Alerts, Category};
use crate::output::{emit_success, format_duration, HumanOutput, OutputOptions};
use crate::session::{EventLog, SessionAction, SessionEvent};
use crate::task::{Task, TaskStore};

pub struct SessionOptions {
    pub id: u64,
    pub action: SessionAction,
    pub json: bool,
    pub quiet: bool,
}

pub struct ReportOptions {
    pub id: Option<u64>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RemindOptions {
    pub id: u64,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct SessionOutput<'a> {
    event: &'a SessionEvent,
    task: &'a Task,
    duration_secs: u64,
    notification: &'a AlertOutcome,
}

#[derive(Serialize)]
struct ReportEntry {
    task_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    duration_secs: u64,
}

#[derive(Serialize)]
struct ReportOutput {
    total_secs: u64,
    tasks: Vec<ReportEntry>,
}

#[derive(Serialize)]
struct RemindOutput<'a> {
    task: &'a Task,
    notification: &'a AlertOutcome,
}

fn category_for(action: SessionAction) -> Category {
    match action {
        SessionAction::Start => Category::SessionStart,
        SessionAction::Pause => Category::SessionPause,
        SessionAction::End => Category::SessionEnd,
    }
}

fn push_alert(human: &mut HumanOutput, outcome: &AlertOutcome) {
    if let Some(warning) = &outcome.warning {
        human.warning(warning.clone());
    }
}

pub fn run_session(ctx: &Context, options: SessionOptions) -> Result<()> {
    let store = TaskStore::new(ctx.storage.clone());
    let mut task = store.get(options.id)?;
    let mut alerts = Alerts::from_config(&ctx.config.notify, &ctx.storage)?;

    ctx.storage.ensure_home()?;
    let event = SessionEvent::new(task.id, options.action, Utc::now());

    // Completion goes first so a failed table write never leaves an end
    // event behind a pending task; a failed append undoes the completion.
    let previous = task.status;
    if options.action == SessionAction::End {
        task = store.complete(task.id)?;
    }
    if let Err(err) = EventLog::new(ctx.storage.sessions_file()).append(&event) {
        if options.action == SessionAction::End && previous != task.status {
            if let Err(restore) = store.set_status(task.id, previous) {
                warn!(task_id = task.id, "status left at {}: {restore}", task.status);
            }
        }
        return Err(err);
    }

    let duration_secs = duration_cache(ctx).get_duration(task.id, event.timestamp)?;

    let verb = match options.action {
        SessionAction::Start => "Started",
        SessionAction::Pause => "Paused",
        SessionAction::End => "Finished",
    };
    let notification = alerts.send(
        category_for(options.action),
        "tasktime",
        &format!("{verb}: {}", task.description),
        Local::now(),
    );

    let mut human = HumanOutput::new(format!("{verb} task {}", task.id));
    human.field("Description", task.description.clone());
    human.field("Time", format_duration(duration_secs));
    if options.action == SessionAction::End {
        human.field("Status", task.status.to_string());
    }
    push_alert(&mut human, &notification);

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        options.action.as_str(),
        &SessionOutput {
            event: &event,
            task: &task,
            duration_secs,
            notification: &notification,
        },
        Some(&human),
    )
}

pub fn run_report(ctx: &Context, options: ReportOptions) -> Result<()> {
    let tasks = TaskStore::new(ctx.storage.clone()).list(None)?;
    let durations = duration_cache(ctx).durations(Utc::now())?;

    let mut entries: Vec<ReportEntry> = Vec::new();
    match options.id {
        Some(id) => {
            let description = tasks
                .iter()
                .find(|task| task.id == id)
                .map(|task| task.description.clone());
            // Deleted tasks stay reportable while the log mentions them
            if description.is_none() && !durations.contains_key(&id) {
                return Err(Error::TaskNotFound(id));
            }
            entries.push(ReportEntry {
                task_id: id,
                description,
                duration_secs: durations.get(&id).copied().unwrap_or(0),
            });
        }
        None => {
            for task in &tasks {
                entries.push(ReportEntry {
                    task_id: task.id,
                    description: Some(task.description.clone()),
                    duration_secs: durations.get(&task.id).copied().unwrap_or(0),
                });
            }
            // Time logged against tasks that were since deleted
            for (task_id, secs) in &durations {
                if !tasks.iter().any(|task| task.id == *task_id) {
                    entries.push(ReportEntry {
                        task_id: *task_id,
                        description: None,
                        duration_secs: *secs,
                    });
                }
            }
        }
    }

    let total_secs = entries.iter().map(|entry| entry.duration_secs).sum();

    let mut human = HumanOutput::new("Time report");
    human.field("Total", format_duration(total_secs));
    for entry in &entries {
        let description = entry.description.as_deref().unwrap_or("(deleted)");
        human.row(format!(
            "{} {} {}",
            entry.task_id,
            description,
            format_duration(entry.duration_secs)
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "report",
        &ReportOutput {
            total_secs,
            tasks: entries,
        },
        Some(&human),
    )
}

pub fn run_remind(ctx: &Context, options: RemindOptions) -> Result<()> {
    let task = TaskStore::new(ctx.storage.clone()).get(options.id)?;
    let mut alerts = Alerts::from_config(&ctx.config.notify, &ctx.storage)?;
    let mut cache = duration_cache(ctx);
    let view = TaskView {
        duration_secs: cache.get_duration(task.id, Utc::now())?,
        running: cache.is_running(task.id)?,
        task,
    };

    let notification = alerts.send(
        Category::Reminder,
        "tasktime reminder",
        &format!("{} (due {})", view.task.description, view.task.deadline),
        Local::now(),
    );

    let mut human = HumanOutput::new(format!("Reminder for task {}", view.task.id));
    human.row(task_line(&view));
    human.field("Delivered", notification.delivered.to_string());
    push_alert(&mut human, &notification);

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "remind",
        &RemindOutput {
            task: &view.task,
            notification: &notification,
        },
        Some(&human),
    )
}
