//! Scheduling runs against the SQLite store, from dataset import onward.

use chrono::{NaiveDate, TimeZone, Utc};
use dayplan_core::{
    schedule_backlog, Dataset, Decision, InstanceStatus, ScheduleDb, ScheduleOptions, ScheduleStore,
    SourceType, TimelineEntry,
};

const DATASET: &str = r#"{
    "windows": [
        {"id": "morning", "label": "Morning", "start_local": "07:00", "end_local": "08:00", "energy": "LOW"},
        {"id": "focus", "label": "Focus", "start_local": "09:00", "end_local": "12:00", "energy": "HIGH"}
    ],
    "projects": [
        {"id": "novel", "name": "Novel", "priority": "HIGH", "stage": "BUILD", "energy": "MEDIUM", "duration_minutes": 90, "skill_ids": ["writing"]},
        {"id": "garden", "name": "Garden", "priority": "LOW", "stage": "RESEARCH", "energy": "LOW"}
    ],
    "tasks": [
        {"id": "t1", "name": "Plan beds", "priority": "MEDIUM", "stage": "PREPARE", "duration_minutes": 40, "project_id": "garden"},
        {"id": "t2", "name": "Buy seeds", "priority": "LOW", "stage": "PREPARE", "duration_minutes": 20, "project_id": "garden"}
    ],
    "habits": [
        {"id": "stretch", "name": "Stretch", "duration_minutes": 15, "recurrence": "daily", "energy": "LOW"}
    ],
    "skills": [
        {"id": "writing", "name": "Writing", "monument_id": "author"}
    ]
}"#;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn options() -> ScheduleOptions {
    ScheduleOptions::default()
        .with_horizon_days(3)
        .with_now(Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap())
}

fn seeded(db: &ScheduleDb) {
    let dataset = Dataset::from_json(DATASET).unwrap();
    let summary = db.import_dataset(&dataset).unwrap();
    assert_eq!(summary.projects, 2);
    assert_eq!(summary.habits, 1);
}

#[test]
fn test_imported_dataset_schedules_end_to_end() {
    let db = ScheduleDb::open_memory("u").unwrap();
    seeded(&db);

    let result = schedule_backlog(&db, "u", base(), &options(), None).unwrap();

    assert!(result.error.is_none());
    assert!(result.failures.is_empty());
    // Three stretches and two projects
    assert_eq!(result.placed.len(), 5);

    let novel = result
        .timeline
        .iter()
        .find_map(|e| match e {
            TimelineEntry::Project(p) if p.project_id == "novel" => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(novel.instance.start_utc, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    assert_eq!(novel.instance.duration_minutes, 90);

    // Garden's duration comes from its tasks
    let garden = result.placed.iter().find(|i| i.source_id == "garden").unwrap();
    assert_eq!(garden.duration_minutes, 60);

    let stored = db.get_instance(&garden.id).unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::Scheduled);
    assert_eq!(stored.start_utc, garden.start_utc);
}

#[test]
fn test_second_run_keeps_project_rows() {
    let db = ScheduleDb::open_memory("u").unwrap();
    seeded(&db);

    let first = schedule_backlog(&db, "u", base(), &options(), None).unwrap();
    let second = schedule_backlog(&db, "u", base(), &options(), None).unwrap();

    let project_ids = |entries: &[TimelineEntry]| {
        let mut ids: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                TimelineEntry::Project(p) => Some((p.instance.id.clone(), p.decision)),
                TimelineEntry::Habit(_) => None,
            })
            .collect();
        ids.sort();
        ids
    };
    let first_ids = project_ids(&first.timeline);
    let second_ids = project_ids(&second.timeline);
    assert_eq!(first_ids.len(), 2);
    for ((id_a, _), (id_b, decision)) in first_ids.iter().zip(&second_ids) {
        assert_eq!(id_a, id_b);
        assert_eq!(*decision, Decision::Kept);
    }

    let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
    let active = db.fetch_instances_for_range("u", start, end).unwrap();
    assert_eq!(active.len(), 5);
}

#[test]
fn test_stale_rows_become_missed_and_are_reused() {
    let db = ScheduleDb::open_memory("u").unwrap();
    seeded(&db);
    let yesterday = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let early = ScheduleOptions::default()
        .with_horizon_days(1)
        .with_now(Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap());
    let first = schedule_backlog(&db, "u", yesterday, &early, None).unwrap();
    let novel_id = first
        .placed
        .iter()
        .find(|i| i.source_id == "novel")
        .map(|i| i.id.clone())
        .unwrap();

    let result = schedule_backlog(&db, "u", base(), &options(), None).unwrap();

    let moved = db.get_instance(&novel_id).unwrap().unwrap();
    assert_eq!(moved.status, InstanceStatus::Scheduled);
    assert_eq!(moved.start_utc, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    assert!(result.timeline.iter().any(|e| matches!(
        e,
        TimelineEntry::Project(p) if p.instance.id == novel_id && p.decision == Decision::Rescheduled
    )));
}

#[test]
fn test_legacy_database_accepts_habits_after_upgrade() {
    let db = ScheduleDb::open_memory_at("u", 1).unwrap();
    assert_eq!(db.schema_version(), 1);
    seeded(&db);

    let result = schedule_backlog(&db, "u", base(), &options(), None).unwrap();

    assert!(result.failures.is_empty());
    assert_eq!(db.schema_version(), 2);
    let habits = result
        .placed
        .iter()
        .filter(|i| i.source_type == SourceType::Habit)
        .count();
    assert_eq!(habits, 3);
}

#[test]
fn test_database_file_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");

    {
        let db = ScheduleDb::open(&path, "u").unwrap();
        seeded(&db);
        schedule_backlog(&db, "u", base(), &options(), None).unwrap();
    }

    let db = ScheduleDb::open(&path, "u").unwrap();
    let ids = db.fetch_scheduled_project_ids("u").unwrap();
    assert!(ids.contains("novel"));
    assert!(ids.contains("garden"));
}
