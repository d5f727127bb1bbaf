//! tasktime schedule and doctor commands.

use serde::Serialize;

use crate::capability::Capabilities;
use crate::cli::Context;
use crate::crontab::{self, InstallReport};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::schedule::{assign_slots, JobEntry, SkippedTask};
use crate::task::TaskStore;

pub struct ScheduleOptions {
    pub dry_run: bool,
    pub json: bool,
    pub quiet: bool,
}

pub struct DoctorOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct ScheduledJob<'a> {
    #[serde(flatten)]
    entry: &'a JobEntry,
    line: String,
}

#[derive(Serialize)]
struct ScheduleOutput<'a> {
    dry_run: bool,
    jobs: Vec<ScheduledJob<'a>>,
    skipped: &'a [SkippedTask],
    #[serde(skip_serializing_if = "Option::is_none")]
    install: Option<InstallReport>,
}

#[derive(Serialize)]
struct DoctorOutput {
    home: String,
    config_file: String,
    config_present: bool,
    tasks: usize,
    capabilities: Capabilities,
}

pub fn run_schedule(ctx: &Context, options: ScheduleOptions) -> Result<()> {
    let schedule = &ctx.config.schedule;
    let tasks = TaskStore::new(ctx.storage.clone()).list(None)?;
    let assignment = assign_slots(&tasks, schedule.priority_wins, &schedule.command)?;

    let jobs: Vec<ScheduledJob<'_>> = assignment
        .entries
        .iter()
        .map(|entry| ScheduledJob {
            entry,
            line: entry.to_crontab_line(&schedule.marker),
        })
        .collect();

    let install = if options.dry_run {
        None
    } else {
        let table = crontab::job_table_from_env();
        Some(crontab::install(
            table.as_ref(),
            &schedule.marker,
            &assignment.entries,
        )?)
    };

    let header = if options.dry_run {
        format!("Schedule preview: {} job(s)", jobs.len())
    } else {
        format!("Scheduled {} job(s)", jobs.len())
    };
    let mut human = HumanOutput::new(header);
    if let Some(report) = &install {
        human.field("Target", report.target.clone());
        human.field("Replaced", report.removed.to_string());
        human.field("Installed", report.installed.to_string());
    }
    for job in &jobs {
        human.row(job.line.clone());
    }
    for skipped in &assignment.skipped {
        human.warning(format!("task {} skipped: {}", skipped.task_id, skipped.reason));
    }
    if options.dry_run && !jobs.is_empty() {
        human.hint("tasktime schedule");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "schedule",
        &ScheduleOutput {
            dry_run: options.dry_run,
            jobs,
            skipped: &assignment.skipped,
            install,
        },
        Some(&human),
    )
}

pub fn run_doctor(ctx: &Context, options: DoctorOptions) -> Result<()> {
    let capabilities = ctx.capabilities();
    let tasks = TaskStore::new(ctx.storage.clone()).list(None)?.len();
    let config_file = ctx.storage.config_file();

    let mut human = HumanOutput::new("tasktime doctor");
    human.field("Home", ctx.storage.home().display().to_string());
    human.field(
        "Config",
        if config_file.exists() {
            config_file.display().to_string()
        } else {
            "defaults".to_string()
        },
    );
    human.field("Tasks", tasks.to_string());
    human.field(
        "crontab",
        match (&capabilities.crontab_file, &capabilities.crontab) {
            (Some(file), _) => format!("file {}", file.display()),
            (None, Some(bin)) => bin.display().to_string(),
            (None, None) => "missing".to_string(),
        },
    );
    human.field("Notifications", capabilities.notifier);
    if !capabilities.can_schedule() {
        human.warning("crontab not found; `tasktime schedule` will fail");
        human.hint(format!(
            "install cron or set {} to a file",
            crontab::CRONTAB_FILE_ENV
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "doctor",
        &DoctorOutput {
            home: ctx.storage.home().display().to_string(),
            config_present: config_file.exists(),
            config_file: config_file.display().to_string(),
            tasks,
            capabilities,
        },
        Some(&human),
    )
}
