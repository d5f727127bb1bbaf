//! Shared output formatting for tasktime CLI commands.
//!
//! Human output is a title, `key: value` fields, free-form rows, then
//! warnings and at most one hint. JSON output wraps the command's data in
//! a versioned envelope on stdout. Startup warnings go to stderr so they
//! never corrupt JSON.

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "tasktime.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    title: String,
    fields: Vec<(String, String)>,
    rows: Vec<String>,
    warnings: Vec<String>,
    hint: Option<String>,
}

impl HumanOutput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            rows: Vec::new(),
            warnings: Vec::new(),
            hint: None,
        }
    }

    pub fn field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// A task line, a crontab line, a report line
    pub fn row(&mut self, value: impl Into<String>) {
        self.rows.push(value.into());
    }

    /// Also carried into the JSON envelope
    pub fn warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    /// Suggested follow-up command; the last call wins
    pub fn hint(&mut self, value: impl Into<String>) {
        self.hint = Some(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings: human.map(|h| h.warnings.clone()).unwrap_or_default(),
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = error_hint(err);
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            hint: Option<String>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
                hint,
            },
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Startup diagnostic on stderr; silenced by `--quiet`
pub fn emit_warning(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("warning: {message}");
    }
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.title.clone()];
    lines.extend(
        output
            .fields
            .iter()
            .map(|(key, value)| format!("  {key}: {value}")),
    );

    if !output.rows.is_empty() {
        lines.push(String::new());
        lines.extend(output.rows.iter().map(|row| format!("  {row}")));
    }

    if !output.warnings.is_empty() || output.hint.is_some() {
        lines.push(String::new());
    }
    lines.extend(output.warnings.iter().map(|w| format!("warning: {w}")));
    if let Some(hint) = &output.hint {
        lines.push(format!("hint: {hint}"));
    }

    lines.join("\n")
}

/// First positional argument, used to label error output before clap runs
pub fn infer_command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--home" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "tasktime".to_string()
}

/// `1h 02m 03s` style rendering of a second count
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::TaskNotFound(_) => "task_not_found",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::InvalidConfig(_) => "invalid_config",
        Error::MissingDependency(_) => "missing_dependency",
        Error::InvalidData { .. } => "corrupt_data",
        Error::LockFailed(_) => "busy",
        Error::InstallFailed(_) => "install_failed",
        _ => "io",
    }
}

fn error_hint(err: &Error) -> Option<String> {
    match err {
        Error::TaskNotFound(_) => Some("tasktime list shows existing task ids".to_string()),
        Error::MissingDependency(_) => Some("tasktime doctor reports what is missing".to_string()),
        Error::InvalidConfig(_) => Some("edit tasktime.toml in the tasktime home".to_string()),
        Error::InvalidData { path, line, .. } => Some(format!(
            "repair line {line} of {} or move the file aside",
            path.display()
        )),
        Error::LockFailed(path) => Some(format!(
            "another tasktime command holds {}; retry when it finishes",
            path.display()
        )),
        Error::InstallFailed(_) => {
            Some("tasktime schedule --dry-run prints the lines that were rejected".to_string())
        }
        _ => None,
    }
}
