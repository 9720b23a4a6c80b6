//! SQLite-based storage for scheduling inputs and placement instances.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::{migrations, Dataset, ScheduleStore};
use crate::energy::EnergyLevel;
use crate::error::StoreError;
use crate::schedule::{
    DaylightPreference, Habit, HabitType, InstancePlacement, InstanceStatus, NewInstance, Project,
    ScheduleInstance, SourceType, Task, Window, WindowEdgePreference,
};

// === Helper Functions ===

/// Format an instant for storage. One fixed-width format keeps text
/// comparison in range queries consistent with time order, and full
/// precision keeps clock-clamped starts exact.
fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an optional RFC3339 column, treating garbage as absent
fn parse_optional_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_required_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode {
            field: field.to_string(),
            message: e.to_string(),
        })
}

/// Parse an energy column. Blank means unset.
fn parse_energy(value: Option<&str>) -> Result<Option<EnergyLevel>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => EnergyLevel::parse(label)
            .map(Some)
            .ok_or_else(|| format!("unknown energy level '{label}'")),
    }
}

fn format_energy(energy: Option<EnergyLevel>) -> Option<&'static str> {
    energy.map(EnergyLevel::as_str)
}

/// Parse a JSON integer list column; malformed lists read as absent.
fn parse_int_list<T: serde::de::DeserializeOwned>(field: &str, value: Option<String>) -> Option<Vec<T>> {
    let raw = value?;
    match serde_json::from_str(&raw) {
        Ok(list) => Some(list),
        Err(e) => {
            tracing::warn!(field, "ignoring malformed list '{raw}': {e}");
            None
        }
    }
}

fn format_int_list<T: Serialize>(value: Option<&Vec<T>>) -> Option<String> {
    value.and_then(|list| serde_json::to_string(list).ok())
}

/// Build a Window from a database row, or `None` when its energy label is unknown
fn row_to_window(row: &rusqlite::Row) -> Result<Option<Window>, rusqlite::Error> {
    let id: String = row.get(0)?;
    let energy_str: Option<String> = row.get(2)?;
    let energy = match parse_energy(energy_str.as_deref()) {
        Ok(energy) => energy,
        Err(message) => {
            tracing::warn!(window_id = %id, "skipping window: {message}");
            return Ok(None);
        }
    };

    Ok(Some(Window {
        id,
        label: row.get(1)?,
        energy,
        start_local: row.get(3)?,
        end_local: row.get(4)?,
        days: parse_int_list("windows.days", row.get(5)?),
        location_context: row.get(6)?,
        from_prev_day: false,
    }))
}

/// Build a Task from a database row
fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let energy_str: Option<String> = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        priority: row.get(2)?,
        stage: row.get(3)?,
        duration_minutes: row.get(4)?,
        energy: parse_energy(energy_str.as_deref()).unwrap_or(None),
        project_id: row.get(6)?,
        skill_id: row.get(7)?,
    })
}

/// Build a Habit from a database row
fn row_to_habit(row: &rusqlite::Row) -> Result<Habit, rusqlite::Error> {
    let habit_type: Option<String> = row.get(3)?;
    let energy_str: Option<String> = row.get(6)?;
    let daylight: Option<String> = row.get(11)?;
    let edge: Option<String> = row.get(12)?;

    Ok(Habit {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        habit_type: HabitType::parse(habit_type.as_deref()),
        recurrence: row.get(4)?,
        recurrence_days: parse_int_list("habits.recurrence_days", row.get(5)?),
        energy: parse_energy(energy_str.as_deref()).unwrap_or(None),
        window_id: row.get(7)?,
        skill_id: row.get(8)?,
        goal_id: row.get(9)?,
        location_context: row.get(10)?,
        daylight_preference: DaylightPreference::parse(daylight.as_deref()),
        window_edge_preference: WindowEdgePreference::parse(edge.as_deref()),
        last_completed_at: parse_optional_datetime(row.get(13)?),
        created_at: parse_optional_datetime(row.get(14)?),
        updated_at: parse_optional_datetime(row.get(15)?),
    })
}

const INSTANCE_COLUMNS: &str = "id, user_id, source_type, source_id, window_id, start_utc, end_utc,
     duration_minutes, status, weight_snapshot, energy_resolved, completed_at";

/// Raw instance columns, decoded outside the row callback so failures carry a field name.
struct InstanceRow {
    id: String,
    user_id: String,
    source_type: String,
    source_id: String,
    window_id: Option<String>,
    start_utc: String,
    end_utc: String,
    duration_minutes: i64,
    status: String,
    weight_snapshot: Option<f64>,
    energy_resolved: Option<String>,
    completed_at: Option<String>,
}

fn row_to_instance_row(row: &rusqlite::Row) -> Result<InstanceRow, rusqlite::Error> {
    Ok(InstanceRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        source_type: row.get(2)?,
        source_id: row.get(3)?,
        window_id: row.get(4)?,
        start_utc: row.get(5)?,
        end_utc: row.get(6)?,
        duration_minutes: row.get(7)?,
        status: row.get(8)?,
        weight_snapshot: row.get(9)?,
        energy_resolved: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

impl InstanceRow {
    fn decode(self) -> Result<ScheduleInstance, StoreError> {
        let source_type = SourceType::parse(&self.source_type).ok_or_else(|| StoreError::Decode {
            field: "schedule_instances.source_type".into(),
            message: format!("unknown source type '{}'", self.source_type),
        })?;
        let status = InstanceStatus::parse(&self.status).ok_or_else(|| StoreError::Decode {
            field: "schedule_instances.status".into(),
            message: format!("unknown status '{}'", self.status),
        })?;

        Ok(ScheduleInstance {
            id: self.id,
            user_id: self.user_id,
            source_type,
            source_id: self.source_id,
            window_id: self.window_id,
            start_utc: parse_required_datetime("schedule_instances.start_utc", &self.start_utc)?,
            end_utc: parse_required_datetime("schedule_instances.end_utc", &self.end_utc)?,
            duration_minutes: self.duration_minutes,
            status,
            weight_snapshot: self.weight_snapshot,
            energy_resolved: parse_energy(self.energy_resolved.as_deref()).unwrap_or(None),
            completed_at: parse_optional_datetime(self.completed_at),
        })
    }
}

/// Counts of rows written by [`ScheduleDb::import_dataset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub windows: usize,
    pub projects: usize,
    pub tasks: usize,
    pub habits: usize,
    pub skills: usize,
}

/// SQLite database for scheduling.
///
/// Stores windows, projects, tasks, habits and skills, plus the placement
/// instances runs write back. Reads and writes are scoped to one user.
pub struct ScheduleDb {
    conn: Mutex<Connection>,
    user_id: String,
}

impl ScheduleDb {
    /// Open (or create) the database at `path` and apply all migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, user_id: impl Into<String>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened schedule database");
        Self::with_connection(conn, user_id.into(), migrations::CURRENT_VERSION)
    }

    /// Open an in-memory database at the current schema version.
    pub fn open_memory(user_id: impl Into<String>) -> Result<Self, StoreError> {
        Self::open_memory_at(user_id, migrations::CURRENT_VERSION)
    }

    /// Open an in-memory database migrated only up to `version`.
    pub fn open_memory_at(user_id: impl Into<String>, version: i32) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, user_id.into(), version)
    }

    fn with_connection(conn: Connection, user_id: String, version: i32) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate_to(&conn, version)?;
        Ok(Self {
            conn: Mutex::new(conn),
            user_id,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schema version the database is currently at.
    pub fn schema_version(&self) -> i32 {
        migrations::schema_version(&self.conn())
    }

    /// Upsert every record in `dataset` in one transaction.
    pub fn import_dataset(&self, dataset: &Dataset) -> Result<ImportSummary, StoreError> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        for window in &dataset.windows {
            tx.execute(
                "INSERT OR REPLACE INTO windows (id, label, energy, start_local, end_local, days, location_context)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    window.id,
                    window.label,
                    format_energy(window.energy),
                    window.start_local,
                    window.end_local,
                    format_int_list(window.days.as_ref()),
                    window.location_context,
                ],
            )?;
        }

        for project in &dataset.projects {
            tx.execute(
                "INSERT OR REPLACE INTO projects (id, name, priority, stage, energy, duration_minutes, goal_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project.id,
                    project.name,
                    project.priority,
                    project.stage,
                    format_energy(project.energy),
                    project.duration_minutes,
                    project.goal_id,
                ],
            )?;
            tx.execute("DELETE FROM project_skills WHERE project_id = ?1", params![project.id])?;
            for skill_id in &project.skill_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO project_skills (project_id, skill_id) VALUES (?1, ?2)",
                    params![project.id, skill_id],
                )?;
            }
        }

        for task in &dataset.tasks {
            tx.execute(
                "INSERT OR REPLACE INTO tasks (id, name, priority, stage, duration_minutes, energy, project_id, skill_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id,
                    task.name,
                    task.priority,
                    task.stage,
                    task.duration_minutes,
                    format_energy(task.energy),
                    task.project_id,
                    task.skill_id,
                ],
            )?;
        }

        for habit in &dataset.habits {
            tx.execute(
                "INSERT OR REPLACE INTO habits (
                    id, name, duration_minutes, habit_type, recurrence, recurrence_days, energy,
                    window_id, skill_id, goal_id, location_context, daylight_preference,
                    window_edge_preference, last_completed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    habit.id,
                    habit.name,
                    habit.duration_minutes,
                    habit.habit_type.as_str(),
                    habit.recurrence,
                    format_int_list(habit.recurrence_days.as_ref()),
                    format_energy(habit.energy),
                    habit.window_id,
                    habit.skill_id,
                    habit.goal_id,
                    habit.location_context,
                    habit.daylight_preference.as_str(),
                    habit.window_edge_preference.as_str(),
                    habit.last_completed_at.map(format_instant),
                    habit.created_at.map(format_instant),
                    habit.updated_at.map(format_instant),
                ],
            )?;
        }

        for skill in &dataset.skills {
            tx.execute(
                "INSERT OR REPLACE INTO skills (id, name, monument_id) VALUES (?1, ?2, ?3)",
                params![skill.id, skill.name, skill.monument_id],
            )?;
        }

        tx.commit()?;
        let summary = ImportSummary {
            windows: dataset.windows.len(),
            projects: dataset.projects.len(),
            tasks: dataset.tasks.len(),
            habits: dataset.habits.len(),
            skills: dataset.skills.len(),
        };
        tracing::info!(?summary, "imported dataset");
        Ok(summary)
    }

    /// Get an instance by ID, canceled ones included.
    pub fn get_instance(&self, id: &str) -> Result<Option<ScheduleInstance>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {INSTANCE_COLUMNS} FROM schedule_instances WHERE id = ?1"),
                params![id],
                row_to_instance_row,
            )
            .optional()?;
        row.map(InstanceRow::decode).transpose()
    }

    fn query_instances(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ScheduleInstance>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, row_to_instance_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(InstanceRow::decode).collect()
    }
}

impl ScheduleStore for ScheduleDb {
    fn fetch_ready_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, priority, stage, duration_minutes, energy, project_id, skill_id
             FROM tasks ORDER BY id",
        )?;
        let tasks = stmt.query_map([], row_to_task)?.collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    fn fetch_projects_map(&self) -> Result<BTreeMap<String, Project>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, priority, stage, energy, duration_minutes, goal_id FROM projects",
        )?;
        let mut projects = stmt
            .query_map([], |row| {
                let energy_str: Option<String> = row.get(4)?;
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    priority: row.get(2)?,
                    stage: row.get(3)?,
                    energy: parse_energy(energy_str.as_deref()).unwrap_or(None),
                    duration_minutes: row.get(5)?,
                    goal_id: row.get(6)?,
                    skill_ids: Vec::new(),
                })
            })?
            .map(|r| r.map(|p| (p.id.clone(), p)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        // Skills are loaded separately
        let mut skills_stmt =
            conn.prepare("SELECT project_id, skill_id FROM project_skills ORDER BY project_id, skill_id")?;
        let links = skills_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (project_id, skill_id) in links {
            if let Some(project) = projects.get_mut(&project_id) {
                project.skill_ids.push(skill_id);
            }
        }
        Ok(projects)
    }

    fn fetch_all_windows(&self) -> Result<Vec<Window>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, label, energy, start_local, end_local, days, location_context
             FROM windows ORDER BY start_local, id",
        )?;
        let windows = stmt
            .query_map([], row_to_window)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(windows.into_iter().flatten().collect())
    }

    fn fetch_habits_for_schedule(&self) -> Result<Vec<Habit>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, duration_minutes, habit_type, recurrence, recurrence_days, energy,
                    window_id, skill_id, goal_id, location_context, daylight_preference,
                    window_edge_preference, last_completed_at, created_at, updated_at
             FROM habits ORDER BY id",
        )?;
        let habits = stmt.query_map([], row_to_habit)?.collect::<Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    fn fetch_skill_monuments(&self) -> Result<HashMap<String, String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, monument_id FROM skills WHERE monument_id IS NOT NULL")?;
        let map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    fn fetch_instances_for_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleInstance>, StoreError> {
        let start = format_instant(start);
        let end = format_instant(end);
        self.query_instances(
            &format!(
                "SELECT {INSTANCE_COLUMNS} FROM schedule_instances
                 WHERE user_id = ?1 AND status != 'canceled'
                   AND ((start_utc >= ?2 AND start_utc < ?3) OR (start_utc < ?2 AND end_utc > ?2))
                 ORDER BY start_utc, id"
            ),
            params![user_id, start, end],
        )
    }

    fn fetch_backlog_needing_schedule(&self, user_id: &str) -> Result<Vec<ScheduleInstance>, StoreError> {
        self.query_instances(
            &format!(
                "SELECT {INSTANCE_COLUMNS} FROM schedule_instances
                 WHERE user_id = ?1 AND status = 'missed'
                 ORDER BY COALESCE(weight_snapshot, 0) DESC, start_utc"
            ),
            params![user_id],
        )
    }

    fn fetch_scheduled_project_ids(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT source_id FROM schedule_instances
             WHERE user_id = ?1 AND source_type = 'PROJECT'
               AND status IN ('scheduled', 'completed', 'missed')",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }

    fn create_instance(&self, input: &NewInstance) -> Result<ScheduleInstance, StoreError> {
        let placement = &input.placement;
        let instance = ScheduleInstance {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            source_type: input.source_type,
            source_id: input.source_id.clone(),
            window_id: placement.window_id.clone(),
            start_utc: placement.start_utc,
            end_utc: placement.end_utc,
            duration_minutes: placement.duration_minutes,
            status: InstanceStatus::Scheduled,
            weight_snapshot: Some(placement.weight_snapshot),
            energy_resolved: Some(placement.energy_resolved),
            completed_at: None,
        };

        self.conn().execute(
            "INSERT INTO schedule_instances
                (id, user_id, source_type, source_id, window_id, start_utc, end_utc,
                 duration_minutes, status, weight_snapshot, energy_resolved, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL)",
            params![
                instance.id,
                instance.user_id,
                instance.source_type.as_str(),
                instance.source_id,
                instance.window_id,
                format_instant(instance.start_utc),
                format_instant(instance.end_utc),
                instance.duration_minutes,
                instance.status.as_str(),
                instance.weight_snapshot,
                format_energy(instance.energy_resolved),
            ],
        )?;
        Ok(instance)
    }

    fn reschedule_instance(&self, id: &str, placement: &InstancePlacement) -> Result<ScheduleInstance, StoreError> {
        let changed = self.conn().execute(
            "UPDATE schedule_instances
             SET window_id = ?1, start_utc = ?2, end_utc = ?3, duration_minutes = ?4,
                 weight_snapshot = ?5, energy_resolved = ?6, status = 'scheduled', completed_at = NULL
             WHERE id = ?7",
            params![
                placement.window_id,
                format_instant(placement.start_utc),
                format_instant(placement.end_utc),
                placement.duration_minutes,
                placement.weight_snapshot,
                placement.energy_resolved.as_str(),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("schedule instance {id}")));
        }
        self.get_instance(id)?
            .ok_or_else(|| StoreError::NotFound(format!("schedule instance {id}")))
    }

    fn update_instance_status(
        &self,
        id: &str,
        status: InstanceStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let completed_at = (status == InstanceStatus::Completed)
            .then(|| format_instant(completed_at.unwrap_or_else(Utc::now)));
        let changed = self.conn().execute(
            "UPDATE schedule_instances SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.as_str(), completed_at, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("schedule instance {id}")));
        }
        Ok(())
    }

    fn mark_missed_before(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let changed = self.conn().execute(
            "UPDATE schedule_instances SET status = 'missed'
             WHERE user_id = ?1 AND status = 'scheduled' AND start_utc < ?2",
            params![user_id, format_instant(cutoff)],
        )?;
        Ok(changed)
    }

    fn habit_source_type_supported(&self) -> Result<bool, StoreError> {
        Ok(self.schema_version() >= 2)
    }

    fn ensure_habit_source_type(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        tracing::warn!("upgrading schedule_instances to accept HABIT rows");
        migrations::migrate(&conn)?;
        Ok(())
    }
}
