//! Job table install.
//!
//! Generated lines are tagged `# <marker> task=<id>`. An install rewrites
//! the whole table in one write: every tagged line is dropped, everything
//! else is kept, and the new entries are appended.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Error, Result};
use crate::lock;
use crate::schedule::JobEntry;

/// Environment variable selecting a plain file instead of the user crontab
pub const CRONTAB_FILE_ENV: &str = "TASKTIME_CRONTAB_FILE";

/// External binary managing the user crontab
pub const CRONTAB_BIN: &str = "crontab";

/// A job table that can be read and replaced as a whole
pub trait JobTable {
    fn describe(&self) -> String;
    fn read(&self) -> Result<String>;
    fn replace(&self, content: &str) -> Result<()>;
}

/// The invoking user's crontab via `crontab -l` / `crontab -`
#[derive(Debug, Default)]
pub struct SystemCrontab;

impl SystemCrontab {
    fn binary() -> Result<PathBuf> {
        which::which(CRONTAB_BIN).map_err(|err| {
            Error::MissingDependency(format!(
                "'{CRONTAB_BIN}' not found in PATH ({err}); set {CRONTAB_FILE_ENV} to use a file"
            ))
        })
    }
}

impl JobTable for SystemCrontab {
    fn describe(&self) -> String {
        "user crontab".to_string()
    }

    fn read(&self) -> Result<String> {
        let output = Command::new(Self::binary()?).arg("-l").output()?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // An empty table is reported as a failure by most cron implementations
        if stderr.to_ascii_lowercase().contains("no crontab") {
            return Ok(String::new());
        }
        Err(Error::OperationFailed(format!(
            "crontab -l failed: {}",
            stderr.trim()
        )))
    }

    fn replace(&self, content: &str) -> Result<()> {
        let mut child = Command::new(Self::binary()?)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::InstallFailed("crontab stdin unavailable".to_string()))?;
            stdin.write_all(content.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::InstallFailed(format!(
                "crontab - rejected the table: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// A crontab-formatted file, replaced atomically
#[derive(Debug, Clone)]
pub struct FileJobTable {
    path: PathBuf,
}

impl FileJobTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JobTable for FileJobTable {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn replace(&self, content: &str) -> Result<()> {
        lock::write_atomic(&self.path, content.as_bytes())
    }
}

/// Job table selected by the environment
pub fn job_table_from_env() -> Box<dyn JobTable> {
    match std::env::var_os(CRONTAB_FILE_ENV) {
        Some(path) if !path.is_empty() => Box::new(FileJobTable::new(path)),
        _ => Box::new(SystemCrontab),
    }
}

fn tag(marker: &str) -> String {
    format!("# {marker} task=")
}

pub fn is_generated_line(line: &str, marker: &str) -> bool {
    line.contains(&tag(marker))
}

/// Existing table with generated lines swapped for `entries`
pub fn merge_entries(existing: &str, marker: &str, entries: &[JobEntry]) -> String {
    let mut out = String::new();
    for line in existing.lines() {
        if is_generated_line(line, marker) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    for entry in entries {
        out.push_str(&entry.to_crontab_line(marker));
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct InstallReport {
    pub target: String,
    pub removed: usize,
    pub installed: usize,
}

/// Replace every generated line in `table` with `entries`
pub fn install(table: &dyn JobTable, marker: &str, entries: &[JobEntry]) -> Result<InstallReport> {
    let existing = table.read()?;
    let removed = existing
        .lines()
        .filter(|line| is_generated_line(line, marker))
        .count();
    let merged = merge_entries(&existing, marker, entries);
    table.replace(&merged)?;

    debug!(
        target_table = %table.describe(),
        removed,
        installed = entries.len(),
        "job table replaced"
    );
    Ok(InstallReport {
        target: table.describe(),
        removed,
        installed: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{render_command, Slot};
    use tempfile::tempdir;

    fn entry(task_id: u64, minute: u32) -> JobEntry {
        JobEntry {
            slot: Slot {
                minute,
                hour: 9,
                day_of_month: None,
                weekday: None,
            },
            task_id,
            command: render_command("tasktime remind {id}", task_id),
        }
    }

    #[test]
    fn merge_keeps_foreign_lines_and_replaces_generated() {
        let existing = "MAILTO=me@example.com\n\
                        0 3 * * * /usr/bin/backup\n\
                        0 9 * * * tasktime remind 1 # tasktime task=1\n\
                        0 8 * * * other # other-tool task=9\n";
        let merged = merge_entries(existing, "tasktime", &[entry(2, 5)]);

        assert_eq!(
            merged,
            "MAILTO=me@example.com\n\
             0 3 * * * /usr/bin/backup\n\
             0 8 * * * other # other-tool task=9\n\
             5 9 * * * tasktime remind 2 # tasktime task=2\n"
        );
    }

    #[test]
    fn install_into_file_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let table = FileJobTable::new(dir.path().join("crontab"));
        std::fs::write(table.path(), "0 3 * * * /usr/bin/backup\n").expect("seed");

        let entries = vec![entry(1, 0), entry(2, 1)];
        let first = install(&table, "tasktime", &entries).expect("install");
        assert_eq!(first.removed, 0);
        assert_eq!(first.installed, 2);

        let second = install(&table, "tasktime", &entries).expect("install");
        assert_eq!(second.removed, 2);

        let content = std::fs::read_to_string(table.path()).expect("read");
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("0 3 * * * /usr/bin/backup\n"));
    }

    #[test]
    fn install_with_no_entries_clears_generated_lines() {
        let dir = tempdir().expect("tempdir");
        let table = FileJobTable::new(dir.path().join("crontab"));
        install(&table, "tasktime", &[entry(1, 0)]).expect("install");
        install(&table, "tasktime", &[]).expect("install");

        let content = table.read().expect("read");
        assert!(content.is_empty());
    }
}
