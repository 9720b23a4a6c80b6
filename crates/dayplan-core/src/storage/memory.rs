//! In-memory [`ScheduleStore`].
//!
//! Holds everything behind one mutex. Builder methods seed inputs; the
//! `fail_*` switches inject store errors so callers can exercise abort and
//! per-item failure paths.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::ScheduleStore;
use crate::error::StoreError;
use crate::schedule::{
    Habit, InstancePlacement, InstanceStatus, NewInstance, Project, ScheduleInstance, SourceType, Task, Window,
};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ReadyTasks,
    Projects,
    Windows,
    Habits,
    SkillMonuments,
    InstancesForRange,
    Backlog,
    ScheduledProjectIds,
    MarkMissed,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    projects: BTreeMap<String, Project>,
    windows: Vec<Window>,
    habits: Vec<Habit>,
    skill_monuments: HashMap<String, String>,
    instances: Vec<ScheduleInstance>,
    failing_ops: HashSet<StoreOp>,
    failing_sources: HashSet<String>,
    habit_rows_rejected: bool,
    probe_reports_supported: bool,
    remediation_fails: bool,
    remediation_attempts: usize,
    writes: usize,
}

/// Mutex-guarded in-memory store for a single user.
#[derive(Debug)]
pub struct MemoryStore {
    user_id: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    // === Builders ===

    pub fn with_window(mut self, window: Window) -> Self {
        self.state_mut().windows.push(window);
        self
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.state_mut().projects.insert(project.id.clone(), project);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.state_mut().tasks.push(task);
        self
    }

    pub fn with_habit(mut self, habit: Habit) -> Self {
        self.state_mut().habits.push(habit);
        self
    }

    pub fn with_skill_monument(mut self, skill_id: impl Into<String>, monument_id: impl Into<String>) -> Self {
        self.state_mut()
            .skill_monuments
            .insert(skill_id.into(), monument_id.into());
        self
    }

    pub fn with_instance(mut self, instance: ScheduleInstance) -> Self {
        self.state_mut().instances.push(instance);
        self
    }

    /// Reject HABIT instances until [`ScheduleStore::ensure_habit_source_type`] runs.
    pub fn with_legacy_schema(mut self) -> Self {
        let state = self.state_mut();
        state.habit_rows_rejected = true;
        state.probe_reports_supported = false;
        self
    }

    /// Like [`Self::with_legacy_schema`], but the capability probe claims
    /// support, so the rejection only surfaces on insert.
    pub fn with_unprobed_legacy_schema(mut self) -> Self {
        let state = self.state_mut();
        state.habit_rows_rejected = true;
        state.probe_reports_supported = true;
        self
    }

    /// Make every remediation attempt fail.
    pub fn with_failing_remediation(mut self) -> Self {
        self.state_mut().remediation_fails = true;
        self
    }

    /// Make `op` fail with a query error.
    pub fn fail(&self, op: StoreOp) {
        self.state().failing_ops.insert(op);
    }

    /// Make writes for instances of `source_id` fail.
    pub fn fail_writes_for(&self, source_id: impl Into<String>) {
        self.state().failing_sources.insert(source_id.into());
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_ops.clear();
        state.failing_sources.clear();
    }

    // === Inspection ===

    /// Snapshot of every stored instance, canceled ones included.
    pub fn instances(&self) -> Vec<ScheduleInstance> {
        self.state().instances.clone()
    }

    /// Snapshot of non-canceled instances ordered by start.
    pub fn active_instances(&self) -> Vec<ScheduleInstance> {
        let mut active: Vec<_> = self
            .state()
            .instances
            .iter()
            .filter(|i| i.status.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|i| i.start_utc);
        active
    }

    pub fn instance(&self, id: &str) -> Option<ScheduleInstance> {
        self.state().instances.iter().find(|i| i.id == id).cloned()
    }

    /// Number of successful create and reschedule calls.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    pub fn remediation_attempts(&self) -> usize {
        self.state().remediation_attempts
    }

    /// Replace a stored project, e.g. to simulate an edit between runs.
    pub fn put_project(&self, project: Project) {
        self.state().projects.insert(project.id.clone(), project);
    }

    fn check(&self, state: &MemoryState, op: StoreOp) -> Result<(), StoreError> {
        if state.failing_ops.contains(&op) {
            Err(StoreError::Query(format!("injected failure: {op:?}")))
        } else {
            Ok(())
        }
    }
}

impl ScheduleStore for MemoryStore {
    fn fetch_ready_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::ReadyTasks)?;
        Ok(state.tasks.clone())
    }

    fn fetch_projects_map(&self) -> Result<BTreeMap<String, Project>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::Projects)?;
        Ok(state.projects.clone())
    }

    fn fetch_all_windows(&self) -> Result<Vec<Window>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::Windows)?;
        Ok(state.windows.clone())
    }

    fn fetch_habits_for_schedule(&self) -> Result<Vec<Habit>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::Habits)?;
        Ok(state.habits.clone())
    }

    fn fetch_skill_monuments(&self) -> Result<HashMap<String, String>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::SkillMonuments)?;
        Ok(state.skill_monuments.clone())
    }

    fn fetch_instances_for_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleInstance>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::InstancesForRange)?;
        let mut found: Vec<_> = state
            .instances
            .iter()
            .filter(|i| i.user_id == user_id && i.status.is_active())
            .filter(|i| {
                (i.start_utc >= start && i.start_utc < end) || (i.start_utc < start && i.end_utc > start)
            })
            .cloned()
            .collect();
        found.sort_by_key(|i| i.start_utc);
        Ok(found)
    }

    fn fetch_backlog_needing_schedule(&self, user_id: &str) -> Result<Vec<ScheduleInstance>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::Backlog)?;
        let mut missed: Vec<_> = state
            .instances
            .iter()
            .filter(|i| i.user_id == user_id && i.status == InstanceStatus::Missed)
            .cloned()
            .collect();
        missed.sort_by(|a, b| {
            b.weight_snapshot
                .unwrap_or(0.0)
                .total_cmp(&a.weight_snapshot.unwrap_or(0.0))
        });
        Ok(missed)
    }

    fn fetch_scheduled_project_ids(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let state = self.state();
        self.check(&state, StoreOp::ScheduledProjectIds)?;
        Ok(state
            .instances
            .iter()
            .filter(|i| i.user_id == user_id && i.source_type == SourceType::Project && i.status.is_active())
            .map(|i| i.source_id.clone())
            .collect())
    }

    fn create_instance(&self, input: &NewInstance) -> Result<ScheduleInstance, StoreError> {
        let mut state = self.state();
        if state.failing_sources.contains(&input.source_id) {
            return Err(StoreError::Query(format!("injected write failure for {}", input.source_id)));
        }
        if input.source_type == SourceType::Habit && state.habit_rows_rejected {
            return Err(StoreError::UnsupportedSourceType {
                source_type: SourceType::Habit,
            });
        }
        let placement = &input.placement;
        let instance = ScheduleInstance {
            id: uuid::Uuid::new_v4().to_string(),
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
        state.instances.push(instance.clone());
        state.writes += 1;
        Ok(instance)
    }

    fn reschedule_instance(&self, id: &str, placement: &InstancePlacement) -> Result<ScheduleInstance, StoreError> {
        let mut state = self.state();
        let failing = state
            .instances
            .iter()
            .any(|i| i.id == id && state.failing_sources.contains(&i.source_id));
        if failing {
            return Err(StoreError::Query(format!("injected write failure for instance {id}")));
        }
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("schedule instance {id}")))?;
        instance.window_id = placement.window_id.clone();
        instance.start_utc = placement.start_utc;
        instance.end_utc = placement.end_utc;
        instance.duration_minutes = placement.duration_minutes;
        instance.status = InstanceStatus::Scheduled;
        instance.weight_snapshot = Some(placement.weight_snapshot);
        instance.energy_resolved = Some(placement.energy_resolved);
        instance.completed_at = None;
        let updated = instance.clone();
        state.writes += 1;
        Ok(updated)
    }

    fn update_instance_status(
        &self,
        id: &str,
        status: InstanceStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let failing = state
            .instances
            .iter()
            .any(|i| i.id == id && state.failing_sources.contains(&i.source_id));
        if failing {
            return Err(StoreError::Query(format!("injected write failure for instance {id}")));
        }
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("schedule instance {id}")))?;
        instance.status = status;
        instance.completed_at = if status == InstanceStatus::Completed {
            Some(completed_at.unwrap_or_else(Utc::now))
        } else {
            None
        };
        Ok(())
    }

    fn mark_missed_before(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state();
        self.check(&state, StoreOp::MarkMissed)?;
        let mut changed = 0;
        for instance in state.instances.iter_mut() {
            if instance.user_id == user_id
                && instance.status == InstanceStatus::Scheduled
                && instance.start_utc < cutoff
            {
                instance.status = InstanceStatus::Missed;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn habit_source_type_supported(&self) -> Result<bool, StoreError> {
        let state = self.state();
        Ok(!state.habit_rows_rejected || state.probe_reports_supported)
    }

    fn ensure_habit_source_type(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.remediation_attempts += 1;
        if state.remediation_fails {
            return Err(StoreError::Query("cannot extend schedule_instance_source_type".into()));
        }
        state.habit_rows_rejected = false;
        state.probe_reports_supported = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergyLevel;
    use chrono::{Duration, TimeZone};

    fn placement(hour: u32) -> InstancePlacement {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap();
        InstancePlacement {
            window_id: Some("w".into()),
            start_utc: start,
            end_utc: start + Duration::minutes(30),
            duration_minutes: 30,
            weight_snapshot: 1.0,
            energy_resolved: EnergyLevel::Low,
        }
    }

    fn new_instance(source_type: SourceType, source_id: &str, hour: u32) -> NewInstance {
        NewInstance {
            user_id: "u".into(),
            source_type,
            source_id: source_id.into(),
            placement: placement(hour),
        }
    }

    #[test]
    fn test_range_query_includes_straddling_instances() {
        let store = MemoryStore::new("u");
        store.create_instance(&new_instance(SourceType::Project, "p1", 8)).unwrap();
        store.create_instance(&new_instance(SourceType::Project, "p2", 10)).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 15, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let found = store.fetch_instances_for_range("u", start, end).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_id, "p1");
    }

    #[test]
    fn test_mark_missed_and_backlog() {
        let store = MemoryStore::new("u");
        let created = store.create_instance(&new_instance(SourceType::Project, "p1", 8)).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_eq!(store.mark_missed_before("u", cutoff).unwrap(), 1);
        let backlog = store.fetch_backlog_needing_schedule("u").unwrap();
        assert_eq!(backlog[0].id, created.id);
        assert!(store.fetch_scheduled_project_ids("u").unwrap().contains("p1"));
    }

    #[test]
    fn test_legacy_schema_rejects_habits_until_remediated() {
        let store = MemoryStore::new("u").with_legacy_schema();
        assert!(!store.habit_source_type_supported().unwrap());
        let err = store.create_instance(&new_instance(SourceType::Habit, "h1", 7)).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedSourceType { .. }));
        store.ensure_habit_source_type().unwrap();
        assert!(store.create_instance(&new_instance(SourceType::Habit, "h1", 7)).is_ok());
        assert_eq!(store.remediation_attempts(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new("u");
        store.fail(StoreOp::Habits);
        assert!(store.fetch_habits_for_schedule().is_err());
        store.fail_writes_for("p1");
        assert!(store.create_instance(&new_instance(SourceType::Project, "p1", 8)).is_err());
        store.clear_failures();
        assert!(store.fetch_habits_for_schedule().is_ok());
    }

    #[test]
    fn test_windows_for_date_carry_midnight_window() {
        let window = |id: &str, start: &str, end: &str, days: Option<Vec<u8>>| Window {
            id: id.into(),
            label: id.into(),
            energy: Some(EnergyLevel::Low),
            start_local: start.into(),
            end_local: end.into(),
            days,
            location_context: None,
            from_prev_day: false,
        };
        let store = MemoryStore::new("u")
            .with_window(window("desk", "09:00", "12:00", Some(vec![1])))
            .with_window(window("late", "23:00", "01:00", None));

        // 2026-03-02 is a Monday.
        let monday = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let windows = store.fetch_windows_for_date(monday, chrono_tz::Tz::UTC).unwrap();
        let ids: Vec<_> = windows.iter().map(|w| (w.id.as_str(), w.from_prev_day)).collect();
        assert_eq!(ids, vec![("desk", false), ("late", false), ("late", true)]);

        let tuesday = chrono::NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let windows = store.fetch_windows_for_date(tuesday, chrono_tz::Tz::UTC).unwrap();
        assert!(windows.iter().all(|w| w.id == "late"));
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_status_update_records_completion() {
        let store = MemoryStore::new("u");
        let created = store.create_instance(&new_instance(SourceType::Project, "p1", 8)).unwrap();
        store
            .update_instance_status(&created.id, InstanceStatus::Completed, None)
            .unwrap();
        let stored = store.instance(&created.id).unwrap();
        assert_eq!(stored.status, InstanceStatus::Completed);
        assert!(stored.completed_at.is_some());
        store.cancel_instance(&created.id).unwrap();
        assert!(store.active_instances().is_empty());
    }
}
