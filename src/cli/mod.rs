//! Command-line interface for tasktime
//!
//! This module defines the CLI structure using clap derive macros.
//! Commands are grouped into submodules by the state they touch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::capability::Capabilities;
use crate::config::Config;
use crate::error::Result;
use crate::output::emit_warning;
use crate::session::SessionAction;
use crate::storage::{Storage, HOME_ENV};

mod schedule;
mod session;
mod task;

/// tasktime - task time tracking and recurring reminders
///
/// Tracks work sessions against tasks, reports accumulated time, and installs
/// recurring tasks into cron.
#[derive(Parser, Debug)]
#[command(name = "tasktime")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding tasks, sessions and config
    #[arg(long, global = true, env = HOME_ENV)]
    pub home: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging for tasktime
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a pending task
    Add {
        /// What the task is
        description: String,

        /// Deadline, e.g. "2025-03-10 09:30"
        #[arg(long)]
        deadline: String,

        /// Positive integer priority
        #[arg(long, default_value_t = 1)]
        priority: u32,

        /// none, daily, weekly or monthly
        #[arg(long, default_value = "none")]
        recurrence: String,
    },

    /// List tasks with accumulated time
    List {
        /// Only tasks with this status (pending, completed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one task
    Show {
        /// Task id
        id: u64,
    },

    /// Change one field of a task
    Update {
        /// Task id
        id: u64,

        /// description, deadline, priority or recurrence
        field: String,

        /// New value
        value: String,
    },

    /// Delete a task (its session history is kept)
    Delete {
        /// Task id
        id: u64,
    },

    /// Start a work session
    Start {
        /// Task id
        id: u64,
    },

    /// Pause the running session
    Pause {
        /// Task id
        id: u64,
    },

    /// End the session and complete the task
    End {
        /// Task id
        id: u64,
    },

    /// Accumulated time per task
    Report {
        /// Limit the report to one task
        id: Option<u64>,
    },

    /// Install recurring tasks into cron
    Schedule {
        /// Print the generated lines without installing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Send a reminder for a task (run by cron)
    Remind {
        /// Task id
        id: u64,
    },

    /// Report available capabilities
    Doctor,
}

/// State shared by every command: resolved home plus loaded config
pub struct Context {
    pub storage: Storage,
    pub config: Config,
}

impl Context {
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let storage = Storage::resolve(home.as_deref())?;
        let config = Config::load_or_default(&storage.config_file())?;
        Ok(Self { storage, config })
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::probe(&self.config.notify)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context::load(self.home)?;
        let json = self.json;
        let quiet = self.quiet;

        // doctor prints the same findings as its own output
        if !matches!(self.command, Commands::Doctor) {
            for message in ctx.capabilities().missing() {
                emit_warning(&message, quiet);
            }
        }

        match self.command {
            Commands::Add {
                description,
                deadline,
                priority,
                recurrence,
            } => task::run_add(
                &ctx,
                task::AddOptions {
                    description,
                    deadline,
                    priority,
                    recurrence,
                    json,
                    quiet,
                },
            ),
            Commands::List { status } => {
                task::run_list(&ctx, task::ListOptions { status, json, quiet })
            }
            Commands::Show { id } => task::run_show(&ctx, task::ShowOptions { id, json, quiet }),
            Commands::Update { id, field, value } => task::run_update(
                &ctx,
                task::UpdateOptions {
                    id,
                    field,
                    value,
                    json,
                    quiet,
                },
            ),
            Commands::Delete { id } => {
                task::run_delete(&ctx, task::DeleteOptions { id, json, quiet })
            }
            Commands::Start { id } => session::run_session(
                &ctx,
                session::SessionOptions {
                    id,
                    action: SessionAction::Start,
                    json,
                    quiet,
                },
            ),
            Commands::Pause { id } => session::run_session(
                &ctx,
                session::SessionOptions {
                    id,
                    action: SessionAction::Pause,
                    json,
                    quiet,
                },
            ),
            Commands::End { id } => session::run_session(
                &ctx,
                session::SessionOptions {
                    id,
                    action: SessionAction::End,
                    json,
                    quiet,
                },
            ),
            Commands::Report { id } => {
                session::run_report(&ctx, session::ReportOptions { id, json, quiet })
            }
            Commands::Remind { id } => {
                session::run_remind(&ctx, session::RemindOptions { id, json, quiet })
            }
            Commands::Schedule { dry_run } => schedule::run_schedule(
                &ctx,
                schedule::ScheduleOptions {
                    dry_run,
                    json,
                    quiet,
                },
            ),
            Commands::Doctor => schedule::run_doctor(&ctx, schedule::DoctorOptions { json, quiet }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tasktime", "add", "write report", "--deadline", "2025-03-10 09:30", "--json",
            "--priority", "3",
        ])
        .expect("parse");
        assert!(cli.json);
        match cli.command {
            Commands::Add {
                description,
                priority,
                recurrence,
                ..
            } => {
                assert_eq!(description, "write report");
                assert_eq!(priority, 3);
                assert_eq!(recurrence, "none");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn update_takes_field_and_value() {
        let cli = Cli::try_parse_from(["tasktime", "update", "12", "priority", "4"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Update { id: 12, ref field, ref value } if field == "priority" && value == "4"
        ));
    }
}
