mod support;

use predicates::str::contains;

use support::TestHome;

#[test]
fn start_pause_end_append_events_and_complete() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let id = home.add_task("Deep work", "2025-03-10 09:30", 1, "none")?;
    let id_arg = id.to_string();

    let started = home.json(&["start", &id_arg])?;
    assert_eq!(started["command"], "start");
    assert_eq!(started["data"]["event"]["action"], "start");
    assert_eq!(started["data"]["notification"]["transport"], "none");

    home.json(&["pause", &id_arg])?;
    let ended = home.json(&["end", &id_arg])?;
    assert_eq!(ended["data"]["task"]["status"], "completed");

    let log = std::fs::read_to_string(home.sessions_path())?;
    let actions: Vec<&str> = log
        .lines()
        .map(|line| line.split('\t').nth(1).unwrap_or(""))
        .collect();
    assert_eq!(actions, vec!["start", "pause", "end"]);
    assert!(log.lines().all(|line| line.starts_with(&format!("{id}\t"))));
    Ok(())
}

#[test]
fn report_sums_paired_intervals() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let id = home.add_task("Paired", "2025-03-10 09:30", 1, "none")?;
    home.write_file(
        "sessions.log",
        &format!(
            "{id}\tstart\t2025-01-01T10:00:00Z\n\
             {id}\tpause\t2025-01-01T10:01:40Z\n\
             \n\
             not a valid line\n\
             {id}\tstart\t2025-01-01T10:03:20Z\n\
             {id}\tend\t2025-01-01T10:04:10Z\n"
        ),
    )?;

    let report = home.json(&["report", &id.to_string()])?;
    assert_eq!(report["data"]["tasks"][0]["duration_secs"].as_u64(), Some(150));
    assert_eq!(report["data"]["total_secs"].as_u64(), Some(150));

    let shown = home.json(&["show", &id.to_string()])?;
    assert_eq!(shown["data"]["duration_secs"].as_u64(), Some(150));
    assert_eq!(shown["data"]["running"], false);
    Ok(())
}

#[test]
fn report_reflects_appends_between_runs() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let id = home.add_task("Growing", "2025-03-10 09:30", 1, "none")?;
    home.write_file(
        "sessions.log",
        &format!("{id}\tstart\t2025-01-01T10:00:00Z\n{id}\tpause\t2025-01-01T10:00:30Z\n"),
    )?;
    let first = home.json(&["report"])?;
    assert_eq!(first["data"]["tasks"][0]["duration_secs"].as_u64(), Some(30));

    let mut log = std::fs::read_to_string(home.sessions_path())?;
    log.push_str(&format!(
        "{id}\tstart\t2025-01-01T11:00:00Z\n{id}\tend\t2025-01-01T11:00:45Z\n"
    ));
    std::fs::write(home.sessions_path(), log)?;

    let second = home.json(&["report"])?;
    assert_eq!(second["data"]["tasks"][0]["duration_secs"].as_u64(), Some(75));
    Ok(())
}

#[test]
fn orphan_events_and_deleted_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let kept = home.add_task("Kept", "2025-03-10 09:30", 1, "none")?;
    let gone = home.add_task("Gone", "2025-03-10 09:30", 1, "none")?;
    home.write_file(
        "sessions.log",
        &format!(
            "{kept}\tpause\t2025-01-01T10:00:00Z\n\
             {kept}\tend\t2025-01-01T10:05:00Z\n\
             {gone}\tstart\t2025-01-01T10:00:00Z\n\
             {gone}\tend\t2025-01-01T10:10:00Z\n"
        ),
    )?;
    home.cmd().args(["delete", &gone.to_string()]).assert().success();

    let report = home.json(&["report"])?;
    let tasks = report["data"]["tasks"].as_array().ok_or("tasks array")?;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["task_id"].as_u64(), Some(kept));
    assert_eq!(tasks[0]["duration_secs"].as_u64(), Some(0));
    assert_eq!(tasks[1]["task_id"].as_u64(), Some(gone));
    assert_eq!(tasks[1]["duration_secs"].as_u64(), Some(600));
    assert!(tasks[1].get("description").is_none());

    home.cmd()
        .arg("report")
        .assert()
        .success()
        .stdout(contains("(deleted)"));
    Ok(())
}

#[test]
fn double_start_policy_is_configurable() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let id = home.add_task("Twice", "2025-03-10 09:30", 1, "none")?;
    home.write_file(
        "sessions.log",
        &format!(
            "{id}\tstart\t2025-01-01T10:00:00Z\n\
             {id}\tstart\t2025-01-01T10:01:40Z\n\
             {id}\tend\t2025-01-01T10:02:30Z\n"
        ),
    )?;

    let discard = home.json(&["report", &id.to_string()])?;
    assert_eq!(discard["data"]["total_secs"].as_u64(), Some(50));

    home.write_config("[sessions]\ndouble_start = \"merge\"\n")?;
    let merge = home.json(&["report", &id.to_string()])?;
    assert_eq!(merge["data"]["total_secs"].as_u64(), Some(150));
    Ok(())
}

#[test]
fn session_on_unknown_task_fails() {
    let home = TestHome::new();
    home.cmd().args(["start", "99"]).assert().code(2);
    assert!(!home.sessions_path().exists());
}

#[test]
fn remind_is_throttled_across_invocations() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let id = home.add_task("Standup", "2025-03-10 09:30", 1, "daily")?;
    home.write_config("[notify]\nthrottle_secs = 3600\n")?;

    let first = home.json(&["remind", &id.to_string()])?;
    assert_eq!(first["data"]["notification"]["decision"], "allow");
    assert_eq!(first["data"]["notification"]["delivered"], true);

    let second = home.json(&["remind", &id.to_string()])?;
    assert_eq!(second["data"]["notification"]["decision"], "throttled");
    assert_eq!(second["data"]["notification"]["delivered"], false);

    assert!(home.path().join("notify-state.json").exists());
    Ok(())
}

#[test]
fn report_for_unknown_id_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    home.add_task("Real", "2025-03-10 09:30", 1, "none")?;

    home.cmd()
        .args(["report", "424242"])
        .assert()
        .code(2)
        .stderr(contains("Task not found: 424242"));
    Ok(())
}

#[test]
fn failed_end_append_keeps_task_pending() -> Result<(), Box<dyn std::error::Error>> {
    let home = TestHome::new();
    let id = home.add_task("Fragile", "2025-03-10 09:30", 1, "none")?;
    // A directory cannot be appended to
    std::fs::create_dir(home.sessions_path())?;

    home.cmd().args(["end", &id.to_string()]).assert().code(4);

    let table = std::fs::read_to_string(home.tasks_path())?;
    assert!(table.contains("\tFragile\t2025-03-10 09:30\t1\tnone\tpending"));
    Ok(())
}
