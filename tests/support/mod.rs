#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Isolated tasktime home with a file-backed job table
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn crontab_path(&self) -> PathBuf {
        self.dir.path().join("crontab.txt")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.dir.path().join("sessions.log")
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.dir.path().join("tasks.tsv")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file("tasktime.toml", contents)
    }

    /// `tasktime` bound to this home, notifications off, file crontab
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tasktime").expect("binary");
        cmd.env("TASKTIME_HOME", self.path())
            .env("TASKTIME_CRONTAB_FILE", self.crontab_path())
            .env("TASKTIME_DISABLE_NOTIFICATIONS", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json` and parse the envelope
    pub fn json(&self, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        Ok(serde_json::from_slice(&output)?)
    }

    /// Add a task and return its id
    pub fn add_task(
        &self,
        description: &str,
        deadline: &str,
        priority: u32,
        recurrence: &str,
    ) -> Result<u64, Box<dyn std::error::Error>> {
        let priority = priority.to_string();
        let value = self.json(&[
            "add",
            description,
            "--deadline",
            deadline,
            "--priority",
            &priority,
            "--recurrence",
            recurrence,
        ])?;
        value["data"]["id"]
            .as_u64()
            .ok_or_else(|| "add returned no id".into())
    }
}
