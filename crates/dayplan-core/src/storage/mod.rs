//! Persistence for scheduling inputs and placement instances.
//!
//! The engine talks to storage only through [`ScheduleStore`]. Two
//! implementations ship with the crate: [`ScheduleDb`] on SQLite and
//! [`MemoryStore`] for tests and embedding.

mod config;
mod memory;
pub mod migrations;
pub mod schedule_db;

pub use config::{Config, SchedulerSection, StorageSection, MAX_HORIZON_DAYS};
pub use memory::{MemoryStore, StoreOp};
pub use schedule_db::{ImportSummary, ScheduleDb};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schedule::{
    Habit, InstancePlacement, InstanceStatus, NewInstance, Project, ScheduleInstance, Task, Window,
};
use crate::windows::windows_for_date;

/// Returns the data directory.
///
/// `DAYPLAN_HOME` overrides the location outright. Otherwise this is
/// `~/.config/dayplan[-dev]/`, with `DAYPLAN_ENV=dev` selecting the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("DAYPLAN_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DAYPLAN_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("dayplan-dev")
            } else {
                base_dir.join("dayplan")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Read and write contract the scheduler runs against.
///
/// Reads are scoped to the store's user. All methods are synchronous; the
/// scheduler fans independent reads out across threads, hence `Sync`.
pub trait ScheduleStore: Sync {
    /// Tasks eligible to roll up into their projects.
    fn fetch_ready_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Backlog projects keyed by id.
    fn fetch_projects_map(&self) -> Result<BTreeMap<String, Project>, StoreError>;

    /// Every stored window.
    fn fetch_all_windows(&self) -> Result<Vec<Window>, StoreError>;

    /// Windows active on the local calendar day `date`.
    fn fetch_windows_for_date(&self, date: NaiveDate, _time_zone: Tz) -> Result<Vec<Window>, StoreError> {
        Ok(windows_for_date(&self.fetch_all_windows()?, date))
    }

    fn fetch_habits_for_schedule(&self) -> Result<Vec<Habit>, StoreError>;

    /// Skill id to monument id.
    fn fetch_skill_monuments(&self) -> Result<HashMap<String, String>, StoreError>;

    /// Non-canceled instances that start in `[start, end)` or straddle `start`,
    /// ordered by start.
    fn fetch_instances_for_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleInstance>, StoreError>;

    /// `missed` instances, heaviest weight snapshot first.
    fn fetch_backlog_needing_schedule(&self, user_id: &str) -> Result<Vec<ScheduleInstance>, StoreError>;

    /// Ids of projects with a scheduled, completed or missed instance.
    fn fetch_scheduled_project_ids(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Insert a `scheduled` instance.
    fn create_instance(&self, input: &NewInstance) -> Result<ScheduleInstance, StoreError>;

    /// Move an instance and reset it to `scheduled`.
    fn reschedule_instance(&self, id: &str, placement: &InstancePlacement) -> Result<ScheduleInstance, StoreError>;

    /// Set an instance's status. `completed_at` is recorded only for `completed`.
    fn update_instance_status(
        &self,
        id: &str,
        status: InstanceStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Soft-delete an instance.
    fn cancel_instance(&self, id: &str) -> Result<(), StoreError> {
        self.update_instance_status(id, InstanceStatus::Canceled, None)
    }

    /// Flip `scheduled` instances starting before `cutoff` to `missed`.
    /// Returns the number of rows changed.
    fn mark_missed_before(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Whether instances with source type HABIT can be stored.
    fn habit_source_type_supported(&self) -> Result<bool, StoreError>;

    /// Upgrade the store so HABIT instances are accepted.
    fn ensure_habit_source_type(&self) -> Result<(), StoreError>;
}

/// A skill and the monument it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub monument_id: Option<String>,
}

/// Importable snapshot of scheduling inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub windows: Vec<Window>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

impl Dataset {
    /// Parse a dataset from JSON.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Skill id to monument id, for skills that have one.
    pub fn skill_monuments(&self) -> HashMap<String, String> {
        self.skills
            .iter()
            .filter_map(|s| s.monument_id.clone().map(|m| (s.id.clone(), m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_parses_partial_document() {
        let dataset = Dataset::from_json(
            r#"{
                "windows": [{"id": "w1", "start_local": "09:00", "end_local": "12:00", "energy": "HIGH"}],
                "skills": [{"id": "s1", "monument_id": "m1"}, {"id": "s2"}]
            }"#,
        )
        .unwrap();
        assert_eq!(dataset.windows.len(), 1);
        assert!(dataset.projects.is_empty());
        let monuments = dataset.skill_monuments();
        assert_eq!(monuments.get("s1").map(String::as_str), Some("m1"));
        assert!(!monuments.contains_key("s2"));
    }
}
