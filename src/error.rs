//! Error types for tasktime
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, bad config)
//! - 3: Missing external dependency (crontab binary)
//! - 4: Operation failed (I/O, corrupt table, install rejected)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tasktime CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const MISSING_DEPENDENCY: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasktime operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    TaskNotFound(u64),

    // Missing dependencies (exit code 3)
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data in {path} line {line}: {message}")]
    InvalidData {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Job table install failed: {0}")]
    InstallFailed(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::InvalidConfig(_) | Error::TaskNotFound(_) => {
                exit_codes::USER_ERROR
            }

            Error::MissingDependency(_) => exit_codes::MISSING_DEPENDENCY,

            Error::Io(_)
            | Error::Json(_)
            | Error::InvalidData { .. }
            | Error::LockFailed(_)
            | Error::InstallFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details attached to JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::InvalidData { path, line, .. } => Some(serde_json::json!({
                "path": path.display().to_string(),
                "line": line,
            })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for tasktime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
