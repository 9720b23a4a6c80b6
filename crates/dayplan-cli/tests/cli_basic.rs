//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

mod common;

use std::path::Path;

use common::{assert_contains, parse_json, run_cli_failure, run_cli_success};

const DATASET: &str = r#"{
    "windows": [
        {"id": "morning", "label": "Morning", "start_local": "07:00", "end_local": "08:00", "energy": "LOW"},
        {"id": "focus", "label": "Focus", "start_local": "09:00", "end_local": "12:00", "energy": "HIGH"},
        {"id": "late", "label": "Late", "start_local": "23:00", "end_local": "01:00", "energy": "LOW"}
    ],
    "projects": [
        {"id": "novel", "name": "Novel", "priority": "HIGH", "stage": "BUILD", "energy": "MEDIUM", "duration_minutes": 60}
    ],
    "habits": [
        {"id": "stretch", "name": "Stretch", "duration_minutes": 15, "recurrence": "daily", "energy": "LOW", "window_id": "morning"},
        {"id": "review", "name": "Review", "recurrence": "weekly", "recurrence_days": [1], "energy": "LOW"}
    ]
}"#;

fn import(home: &Path) {
    let file = home.join("dataset.json");
    std::fs::write(&file, DATASET).unwrap();
    let out = run_cli_success(home, &["import", file.to_str().unwrap()]);
    assert_contains(&out, "imported 3 windows, 1 projects, 0 tasks, 2 habits, 0 skills");
}

const RUN: &[&str] = &["run", "--date", "2026-03-02", "--time", "06:00", "--tz", "UTC", "--horizon", "2"];

#[test]
fn test_run_json_places_habits_and_projects() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());

    let mut args = RUN.to_vec();
    args.push("--json");
    let result = parse_json(&run_cli_success(home.path(), &args));

    assert!(result["error"].is_null());
    assert_eq!(result["failures"].as_array().unwrap().len(), 0);
    let timeline = result["timeline"].as_array().unwrap();
    // Two stretches, Monday's review, and the project
    assert_eq!(timeline.len(), 4);
    let project = timeline.iter().find(|e| e["type"] == "PROJECT").unwrap();
    assert_eq!(project["project_id"], "novel");
    assert_eq!(project["decision"], "new");
    assert_eq!(project["instance"]["start_utc"], "2026-03-02T09:00:00Z");
}

#[test]
fn test_rerun_reports_kept_projects() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());
    run_cli_success(home.path(), RUN);

    let out = run_cli_success(home.path(), RUN);
    assert_contains(&out, "2026-03-02 09:00-10:00  PROJECT  novel");
    assert_contains(&out, "kept");
}

#[test]
fn test_run_verbose_streams_progress_events() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());

    let mut args = RUN.to_vec();
    args.push("--verbose");
    let (_, stderr, code) = common::run_cli(home.path(), &args);
    assert_eq!(code, 0);
    assert_contains(&stderr, r#""type":"start""#);
    assert_contains(&stderr, r#""type":"complete""#);
}

#[test]
fn test_windows_lists_carried_over_window() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());

    let out = run_cli_success(home.path(), &["windows", "--date", "2026-03-02", "--tz", "UTC"]);
    assert_contains(&out, "focus");
    assert_contains(&out, "2026-03-02 09:00 - 2026-03-02 12:00  HIGH");
    assert_contains(&out, "2026-03-01 23:00 - 2026-03-02 01:00  LOW  (from previous day)");
}

#[test]
fn test_due_respects_weekday_list() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());

    // 2026-03-02 is a Monday
    let out = run_cli_success(home.path(), &["due", "review", "--date", "2026-03-02", "--tz", "UTC"]);
    assert_contains(&out, "review due on 2026-03-02");

    let json = parse_json(&run_cli_success(
        home.path(),
        &["due", "review", "--date", "2026-03-03", "--tz", "UTC", "--json"],
    ));
    assert_eq!(json["is_due"], false);
    assert_eq!(json["reason"], "WEEKDAY_MISMATCH");

    run_cli_failure(home.path(), &["due", "missing-habit"]);
}

#[test]
fn test_instances_and_status_updates() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());
    run_cli_success(home.path(), RUN);

    let args = ["instances", "--from", "2026-03-02", "--days", "2", "--tz", "UTC", "--json"];
    let listed = parse_json(&run_cli_success(home.path(), &args));
    let instances = listed["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 4);
    assert_eq!(listed["scheduled_project_ids"][0], "novel");

    let project = instances.iter().find(|i| i["source_type"] == "PROJECT").unwrap();
    let id = project["id"].as_str().unwrap();
    assert_contains(&run_cli_success(home.path(), &["instance", "complete", id]), "completed");

    let habit = instances.iter().find(|i| i["source_type"] == "HABIT").unwrap();
    let habit_id = habit["id"].as_str().unwrap();
    run_cli_success(home.path(), &["instance", "cancel", habit_id]);

    let listed = parse_json(&run_cli_success(home.path(), &args));
    let instances = listed["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 3);
    let project = instances.iter().find(|i| i["id"] == id).unwrap();
    assert_eq!(project["status"], "completed");

    run_cli_failure(home.path(), &["instance", "cancel", "no-such-instance"]);
}

#[test]
fn test_config_get_and_set() {
    let home = tempfile::tempdir().unwrap();

    assert_eq!(run_cli_success(home.path(), &["config", "get", "scheduler.time_zone"]).trim(), "UTC");
    run_cli_success(home.path(), &["config", "set", "scheduler.horizon_days", "30"]);
    assert_eq!(run_cli_success(home.path(), &["config", "get", "scheduler.horizon_days"]).trim(), "30");

    let shown = parse_json(&run_cli_success(home.path(), &["config", "show"]));
    assert_eq!(shown["storage"]["user_id"], "local");

    run_cli_failure(home.path(), &["config", "get", "scheduler.nope"]);
}

#[test]
fn test_invalid_mode_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    import(home.path());

    let mut args = RUN.to_vec();
    args.extend(["--mode", "sprint"]);
    let (_, stderr, _) = run_cli_failure(home.path(), &args);
    assert_contains(&stderr, "error:");
}
