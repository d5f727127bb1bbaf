use std::path::PathBuf;

use tasktime::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let missing = Error::MissingDependency("crontab".to_string());
    assert_eq!(missing.exit_code(), exit_codes::MISSING_DEPENDENCY);

    let op = Error::InstallFailed("rejected".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);

    let data = Error::InvalidData {
        path: PathBuf::from("tasks.tsv"),
        line: 3,
        message: "bad row".to_string(),
    };
    assert_eq!(data.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::TaskNotFound(42);
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Task not found"));
    assert_eq!(json.details, Some(serde_json::json!({ "task_id": 42 })));
}
