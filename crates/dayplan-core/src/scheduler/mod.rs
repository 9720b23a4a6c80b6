//! Backlog scheduler.
//!
//! [`schedule_backlog`] runs the whole pipeline for one user:
//! - Flags stale placements as missed and loads inputs
//! - Builds the project queue and reconciles existing placements
//! - Places regular habits, then projects, then SYNC habits, day by day
//! - Persists habit placements and returns the merged timeline
//!
//! All placement state lives in the run; nothing is shared between runs.
//! Callers must not run two schedules for the same user concurrently.

pub mod dedupe;
pub mod habits;
pub mod mode;
pub mod persist;
pub mod placement;
pub mod progress;
pub mod queue;

pub use dedupe::{dedupe_existing, DedupeFailure, DedupeOutcome, MIN_DEDUPE_DAYS};
pub use habits::{DayContext, HabitPass, HabitPlacement, HabitStage, DEFAULT_HABIT_DURATION_MINUTES};
pub use mode::{ModeFilter, SchedulerMode};
pub use persist::{HabitCapability, HabitPersister};
pub use placement::{find_windows, CandidateWindow, PlacementRequest, SearchContext};
pub use progress::{EventError, ProgressEvent, ProgressSink};
pub use queue::{
    build_queue, build_schedulable_projects, sort_queue, ProjectQueue, QueueItem, SchedulableProject,
    DEFAULT_PROJECT_DURATION_MINUTES,
};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::thread;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{CoreError, StoreError};
use crate::schedule::{
    Habit, InstancePlacement, NewInstance, Project, ScheduleInstance, SourceType, Task, Window,
};
use crate::storage::{Config, ScheduleStore};
use crate::sunlight::{resolve_sunlight_span, Coordinates, SunlightSpan};
use crate::timeline::{
    sort_timeline, Decision, HabitEntry, OccupiedBlocks, PlacementContext, ProjectEntry, TimelineEntry,
};
use crate::timezone::{add_days, day_offset, parse_time_zone, start_of_day};
use crate::windows::{resolve_windows_for_date, AvailabilityMap, ResolvedWindow};
use progress::Reporter;

pub use crate::storage::MAX_HORIZON_DAYS;

/// Per-run options.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub time_zone: Tz,
    /// Coordinates for sunlight bounds; fixed hours are used without them.
    pub location: Option<Coordinates>,
    pub mode: SchedulerMode,
    /// Day offsets scanned, clamped to `1..=365`.
    pub horizon_days: u32,
    /// Scheduled placements older than this are flagged missed.
    pub missed_grace_minutes: i64,
    /// Current instant; the wall clock when unset.
    pub now: Option<DateTime<Utc>>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            time_zone: Tz::UTC,
            location: None,
            mode: SchedulerMode::Regular,
            horizon_days: MAX_HORIZON_DAYS,
            missed_grace_minutes: 1,
            now: None,
        }
    }
}

impl ScheduleOptions {
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone, ..Self::default() }
    }

    /// Build options from the `[scheduler]` section.
    ///
    /// # Errors
    /// Returns an error for an unknown time zone or mode.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let section = &config.scheduler;
        Ok(Self {
            time_zone: parse_time_zone(Some(&section.time_zone))?,
            location: section.location,
            mode: section.mode.parse()?,
            horizon_days: section.horizon_days(),
            missed_grace_minutes: section.missed_grace_minutes.max(0),
            now: None,
        })
    }

    pub fn with_mode(mut self, mode: SchedulerMode) -> Self {
        self.mode = mode.normalize();
        self
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_location(mut self, location: Option<Coordinates>) -> Self {
        self.location = location;
        self
    }

    fn horizon(&self) -> i64 {
        i64::from(self.horizon_days.clamp(1, MAX_HORIZON_DAYS))
    }
}

/// Why an item was not placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    ModeFiltered,
    NoWindow,
    Error,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::ModeFiltered => "MODE_FILTERED",
            FailureReason::NoWindow => "NO_WINDOW",
            FailureReason::Error => "ERROR",
        }
    }
}

/// An item the run could not place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleFailure {
    pub item_id: String,
    pub reason: FailureReason,
    pub detail: Option<String>,
}

impl ScheduleFailure {
    fn new(item_id: impl Into<String>, reason: FailureReason, detail: Option<String>) -> Self {
        Self { item_id: item_id.into(), reason, detail }
    }

    fn from_store(item_id: impl Into<String>, error: &StoreError) -> Self {
        Self::new(item_id, FailureReason::Error, Some(error.to_string()))
    }
}

/// Phase abort reported in place of a partial result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub stage: String,
    pub message: String,
    pub code: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleBacklogResult {
    /// Instances written by this run.
    pub placed: Vec<ScheduleInstance>,
    pub failures: Vec<ScheduleFailure>,
    /// Every placement, kept ones included, by start.
    pub timeline: Vec<TimelineEntry>,
    pub error: Option<RunError>,
}

/// Inputs loaded by the fan-out.
struct RunInputs {
    tasks: Vec<Task>,
    projects: BTreeMap<String, Project>,
    habits: Vec<Habit>,
    windows: Vec<Window>,
    skill_monuments: HashMap<String, String>,
}

/// One resolved day of the horizon.
struct HorizonDay {
    date: NaiveDate,
    windows: Vec<ResolvedWindow>,
    sunlight: SunlightSpan,
}

/// Lazily resolved days, shared by every pass of a run.
struct Horizon<'a> {
    base: NaiveDate,
    time_zone: Tz,
    location: Option<Coordinates>,
    windows: &'a [Window],
    days: HashMap<i64, HorizonDay>,
}

impl<'a> Horizon<'a> {
    fn new(base: NaiveDate, options: &ScheduleOptions, windows: &'a [Window]) -> Self {
        Self {
            base,
            time_zone: options.time_zone,
            location: options.location,
            windows,
            days: HashMap::new(),
        }
    }

    fn day(&mut self, offset: i64) -> &HorizonDay {
        let (base, tz, location, windows) = (self.base, self.time_zone, self.location, self.windows);
        self.days.entry(offset).or_insert_with(|| {
            let date = add_days(base, offset);
            HorizonDay {
                date,
                windows: resolve_windows_for_date(windows, date, tz),
                sunlight: resolve_sunlight_span(date, tz, location),
            }
        })
    }
}

/// Run-scoped placement bookkeeping.
#[derive(Default)]
struct RunState {
    availability: AvailabilityMap,
    occupied: OccupiedBlocks,
    failures: Vec<ScheduleFailure>,
    placed: Vec<ScheduleInstance>,
    timeline: Vec<TimelineEntry>,
}

/// Schedule a user's backlog projects and habits.
///
/// # Arguments
/// * `store` - Persistence collaborator
/// * `user_id` - Owner of the instances read and written
/// * `base_date` - Local date of day offset 0
/// * `options` - Zone, mode, horizon and clock
/// * `progress` - Optional receiver for progress events
///
/// # Returns
/// The run result. A failed read ends the run early with
/// [`ScheduleBacklogResult::error`] set and nothing written after it.
///
/// # Errors
/// Returns an error only for failures outside the store contract, after
/// emitting an `error` progress event.
pub fn schedule_backlog(
    store: &dyn ScheduleStore,
    user_id: &str,
    base_date: NaiveDate,
    options: &ScheduleOptions,
    progress: Option<&dyn ProgressSink>,
) -> Result<ScheduleBacklogResult, CoreError> {
    let reporter = Reporter::new(progress);
    let result = run_pipeline(store, user_id, base_date, options, &reporter);
    if let Err(e) = &result {
        tracing::error!("scheduler run failed: {e}");
        reporter.emit(ProgressEvent::Error {
            stage: "unhandled".into(),
            message: e.to_string(),
            code: "unhandled".into(),
        });
    }
    result
}

fn run_pipeline(
    store: &dyn ScheduleStore,
    user_id: &str,
    base_date: NaiveDate,
    options: &ScheduleOptions,
    reporter: &Reporter<'_>,
) -> Result<ScheduleBacklogResult, CoreError> {
    let now = options.now.unwrap_or_else(Utc::now);
    let tz = options.time_zone;
    let mode = options.mode.clone().normalize();
    let horizon_days = options.horizon();

    tracing::info!(user = user_id, date = %base_date, mode = %mode, horizon_days, "scheduling backlog");
    reporter.emit(ProgressEvent::Start {
        user_id: user_id.to_string(),
        base_date: base_date.to_string(),
        mode: mode.to_string(),
        horizon_days: horizon_days as u32,
    });

    // 1. MARK_MISSED
    let cutoff = now - Duration::minutes(options.missed_grace_minutes.max(0));
    let marked_missed = match store.mark_missed_before(user_id, cutoff) {
        Ok(count) => count,
        Err(e) => return Ok(abort(reporter, "mark-missed", &e)),
    };
    let backlog = match store.fetch_backlog_needing_schedule(user_id) {
        Ok(backlog) => backlog,
        Err(e) => return Ok(abort(reporter, "missed", &e)),
    };
    reporter.emit(ProgressEvent::MissedFetched {
        marked_missed,
        backlog: backlog.len(),
    });

    // 2. LOAD_INPUTS
    let inputs = match load_inputs(store)? {
        Ok(inputs) => inputs,
        Err(e) => return Ok(abort(reporter, "inputs", &e)),
    };
    let (sync_habits, regular_habits): (Vec<Habit>, Vec<Habit>) = inputs
        .habits
        .iter()
        .cloned()
        .partition(|h| h.habit_type.allows_overlap());
    reporter.emit(ProgressEvent::InputsFetched {
        tasks: inputs.tasks.len(),
        projects: inputs.projects.len(),
        habits: regular_habits.len(),
        sync_habits: sync_habits.len(),
        windows: inputs.windows.len(),
    });

    let mut state = RunState::default();

    // 3. BUILD_QUEUE
    let projects = build_schedulable_projects(&inputs.projects, &inputs.tasks);
    let filter = ModeFilter::new(&mode, &inputs.skill_monuments);
    let queue = build_queue(&backlog, &projects, &mode, &filter);
    for project_id in &queue.mode_filtered {
        state.failures.push(ScheduleFailure::new(
            project_id.clone(),
            FailureReason::ModeFiltered,
            Some(mode.label().to_string()),
        ));
    }
    for redundant in &queue.redundant_missed {
        if let Err(e) = store.cancel_instance(&redundant.id) {
            tracing::warn!(instance = %redundant.id, "failed to cancel redundant missed instance: {e}");
            state.failures.push(ScheduleFailure::from_store(&redundant.source_id, &e));
        }
    }
    reporter.emit(ProgressEvent::QueueBuilt {
        queued: queue.items.len(),
        mode_filtered: queue.mode_filtered.len(),
    });

    // 4. DEDUPE_EXISTING
    let base_start = start_of_day(base_date, tz);
    let dedupe_end = base_start + Duration::days(horizon_days.max(MIN_DEDUPE_DAYS));
    let queued: BTreeMap<String, Option<String>> = queue
        .items
        .iter()
        .map(|item| (item.project_id.clone(), item.instance_id.clone()))
        .collect();
    let outcome = match dedupe_existing(store, user_id, base_start, dedupe_end, &queued) {
        Ok(outcome) => outcome,
        Err(e) => return Ok(abort(reporter, "dedupe", &e)),
    };
    for failure in &outcome.failures {
        state.failures.push(ScheduleFailure::from_store(&failure.source_id, &failure.error));
    }
    for keeper in &outcome.keepers {
        state.occupied.insert(keeper.start_utc, keeper.end_utc);
        state.timeline.push(TimelineEntry::Project(ProjectEntry {
            project_id: keeper.source_id.clone(),
            instance: keeper.clone(),
            decision: Decision::Kept,
            context: PlacementContext {
                scheduled_day_offset: day_offset(base_date, keeper.start_utc, tz),
                available_start: Some(keeper.start_utc),
                window_start: None,
            },
        }));
    }
    for blocking in &outcome.blocking {
        state.occupied.insert(blocking.start_utc, blocking.end_utc);
    }
    reporter.emit(ProgressEvent::DedupeComplete {
        reused_projects: outcome.reusable.len() + queued.values().filter(|id| id.is_some()).count(),
        canceled_project_instances: outcome.canceled_project_instances,
        canceled_habit_instances: outcome.canceled_habit_instances,
    });

    let windows_by_id: HashMap<String, Window> =
        inputs.windows.iter().map(|w| (w.id.clone(), w.clone())).collect();
    let mut horizon = Horizon::new(base_date, options, &inputs.windows);

    // 5. SCHEDULE_REGULAR_HABITS
    let regular = run_habit_pass(
        HabitPass::new(&regular_habits, &windows_by_id, HabitStage::Regular),
        &mut horizon,
        &mut state,
        &mode,
        now,
        horizon_days,
        reporter,
    );

    // 6. SCHEDULE_PROJECTS
    schedule_projects(store, user_id, &queue, &outcome, &mut horizon, &mut state, &mode, now, horizon_days, reporter);

    // 7. SCHEDULE_SYNC_HABITS
    let sync = run_habit_pass(
        HabitPass::new(&sync_habits, &windows_by_id, HabitStage::Sync),
        &mut horizon,
        &mut state,
        &mode,
        now,
        horizon_days,
        reporter,
    );

    // 8. PERSIST_HABITS
    persist_habits(store, user_id, regular.into_iter().chain(sync), &outcome.previously_scheduled_habits, &mut state, reporter);

    // 9. FINALIZE
    sort_timeline(&mut state.timeline);
    tracing::info!(
        placed = state.placed.len(),
        failures = state.failures.len(),
        timeline = state.timeline.len(),
        "scheduling complete"
    );
    reporter.emit(ProgressEvent::Complete {
        placed: state.placed.len(),
        failures: state.failures.len(),
        timeline: state.timeline.len(),
        error: None,
    });

    Ok(ScheduleBacklogResult {
        placed: state.placed,
        failures: state.failures,
        timeline: state.timeline,
        error: None,
    })
}

/// Fetch the independent inputs concurrently.
///
/// The outer error is a crashed fetch thread; the inner one a store error.
fn load_inputs(store: &dyn ScheduleStore) -> Result<Result<RunInputs, StoreError>, CoreError> {
    thread::scope(|s| -> Result<Result<RunInputs, StoreError>, CoreError> {
        let tasks = s.spawn(|| store.fetch_ready_tasks());
        let projects = s.spawn(|| store.fetch_projects_map());
        let habits = s.spawn(|| store.fetch_habits_for_schedule());
        let windows = s.spawn(|| store.fetch_all_windows());
        let monuments = s.spawn(|| store.fetch_skill_monuments());

        let crashed = |what: &str| CoreError::Custom(format!("{what} fetch thread panicked"));
        let tasks = tasks.join().map_err(|_| crashed("tasks"))?;
        let projects = projects.join().map_err(|_| crashed("projects"))?;
        let habits = habits.join().map_err(|_| crashed("habits"))?;
        let windows = windows.join().map_err(|_| crashed("windows"))?;
        let monuments = monuments.join().map_err(|_| crashed("skills"))?;

        Ok(assemble_inputs(tasks, projects, habits, windows, monuments))
    })
}

fn assemble_inputs(
    tasks: Result<Vec<Task>, StoreError>,
    projects: Result<BTreeMap<String, Project>, StoreError>,
    habits: Result<Vec<Habit>, StoreError>,
    windows: Result<Vec<Window>, StoreError>,
    skill_monuments: Result<HashMap<String, String>, StoreError>,
) -> Result<RunInputs, StoreError> {
    Ok(RunInputs {
        tasks: tasks?,
        projects: projects?,
        habits: habits?,
        windows: windows?,
        skill_monuments: skill_monuments?,
    })
}

/// Report a fetch-phase abort and build the result that carries it.
fn abort(reporter: &Reporter<'_>, stage: &str, error: &StoreError) -> ScheduleBacklogResult {
    tracing::error!(stage, "scheduler fetch failed: {error}");
    let run_error = RunError {
        stage: stage.to_string(),
        message: error.to_string(),
        code: error.code().to_string(),
    };
    reporter.emit(ProgressEvent::Error {
        stage: run_error.stage.clone(),
        message: run_error.message.clone(),
        code: run_error.code.clone(),
    });
    reporter.emit(ProgressEvent::Complete {
        placed: 0,
        failures: 0,
        timeline: 0,
        error: Some(EventError {
            message: run_error.message.clone(),
            code: run_error.code.clone(),
        }),
    });
    ScheduleBacklogResult {
        error: Some(run_error),
        ..ScheduleBacklogResult::default()
    }
}

#[allow(clippy::too_many_arguments)]
fn run_habit_pass(
    mut pass: HabitPass<'_>,
    horizon: &mut Horizon<'_>,
    state: &mut RunState,
    mode: &SchedulerMode,
    now: DateTime<Utc>,
    horizon_days: i64,
    reporter: &Reporter<'_>,
) -> Vec<HabitPlacement> {
    let tz = horizon.time_zone;
    let mut placements = Vec::new();
    let mut offsets_with_placements = 0;
    for offset in 0..horizon_days {
        let day = horizon.day(offset);
        let ctx = DayContext {
            date: day.date,
            offset,
            time_zone: tz,
            now: Some(now),
            windows: &day.windows,
            sunlight: &day.sunlight,
            mode,
        };
        let placed = pass.place_day(&ctx, &mut state.availability, &mut state.occupied);
        if !placed.is_empty() {
            offsets_with_placements += 1;
        }
        placements.extend(placed);
    }

    tracing::info!(stage = pass.stage().as_str(), placements = placements.len(), "habit pass complete");
    reporter.emit(ProgressEvent::HabitPassComplete {
        stage: pass.stage().as_str().to_string(),
        placements: placements.len(),
        offsets_with_placements,
    });
    placements
}

#[allow(clippy::too_many_arguments)]
fn schedule_projects(
    store: &dyn ScheduleStore,
    user_id: &str,
    queue: &ProjectQueue,
    outcome: &DedupeOutcome,
    horizon: &mut Horizon<'_>,
    state: &mut RunState,
    mode: &SchedulerMode,
    now: DateTime<Utc>,
    horizon_days: i64,
    reporter: &Reporter<'_>,
) {
    let tz = horizon.time_zone;
    let base = horizon.base;
    let max_offset = if mode.restricts_projects_to_today() { 1 } else { horizon_days };
    let (mut placed, mut failed) = (0, 0);

    for item in &queue.items {
        let reusable = outcome.reusable.get(&item.project_id);
        let reuse_id = item.instance_id.clone().or_else(|| reusable.map(|i| i.id.clone()));
        let request = PlacementRequest::new(item.energy, item.duration_minutes);

        // 1. Earliest day with a fitting window
        let mut found: Option<(CandidateWindow, i64)> = None;
        for offset in 0..max_offset {
            let day = horizon.day(offset);
            let ctx = SearchContext {
                mode,
                now: Some(now),
                sunlight: Some(&day.sunlight),
                availability: &state.availability,
                occupied: &state.occupied,
            };
            if let Some(candidate) = find_windows(&day.windows, &request, &ctx).into_iter().next() {
                found = Some((candidate, offset));
                break;
            }
        }

        let Some((candidate, _)) = found else {
            tracing::warn!(project = %item.project_id, "no window within horizon");
            state.failures.push(ScheduleFailure::new(&item.project_id, FailureReason::NoWindow, None));
            failed += 1;
            // A stale slot must not linger next to fresh placements.
            if let Some(stale) = reusable {
                if let Err(e) = store.cancel_instance(&stale.id) {
                    state.failures.push(ScheduleFailure::from_store(&item.project_id, &e));
                }
            }
            continue;
        };

        // 2. Write: keep, move or create
        let start = candidate.available_start;
        let end = start + request.duration();
        let placement = InstancePlacement {
            window_id: Some(candidate.id().to_string()),
            start_utc: start,
            end_utc: end,
            duration_minutes: item.duration_minutes,
            weight_snapshot: item.weight,
            energy_resolved: item.energy,
        };
        let written = match (reusable, &reuse_id) {
            (Some(existing), Some(id)) if *id == existing.id && existing.matches_placement(&placement) => {
                Ok((existing.clone(), Decision::Kept))
            }
            (_, Some(id)) => store
                .reschedule_instance(id, &placement)
                .map(|i| (i, Decision::Rescheduled)),
            (_, None) => store
                .create_instance(&NewInstance {
                    user_id: user_id.to_string(),
                    source_type: SourceType::Project,
                    source_id: item.project_id.clone(),
                    placement,
                })
                .map(|i| (i, Decision::New)),
        };
        let (instance, decision) = match written {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(project = %item.project_id, "failed to write placement: {e}");
                state.failures.push(ScheduleFailure::from_store(&item.project_id, &e));
                failed += 1;
                continue;
            }
        };

        // 3. Consume the slot
        state.availability.advance_front(&candidate.window, end);
        state.occupied.insert(start, end);
        tracing::debug!(project = %item.project_id, start = %start, decision = decision.as_str(), "placed project");

        if decision != Decision::Kept {
            state.placed.push(instance.clone());
        }
        state.timeline.push(TimelineEntry::Project(ProjectEntry {
            project_id: item.project_id.clone(),
            context: PlacementContext {
                scheduled_day_offset: day_offset(base, instance.start_utc, tz),
                available_start: Some(candidate.available_start),
                window_start: Some(candidate.window.start),
            },
            instance,
            decision,
        }));
        placed += 1;
    }

    reporter.emit(ProgressEvent::ProjectsScheduled {
        attempted: queue.items.len(),
        placed,
        failed,
    });
}

fn persist_habits(
    store: &dyn ScheduleStore,
    user_id: &str,
    placements: impl Iterator<Item = HabitPlacement>,
    previously_scheduled: &BTreeSet<String>,
    state: &mut RunState,
    reporter: &Reporter<'_>,
) {
    let mut persister = HabitPersister::new(store);
    let (mut inserted, mut failures) = (0, 0);

    for placement in placements {
        let input = NewInstance {
            user_id: user_id.to_string(),
            source_type: SourceType::Habit,
            source_id: placement.habit_id.clone(),
            placement: InstancePlacement {
                window_id: Some(placement.window_id.clone()),
                start_utc: placement.start_utc,
                end_utc: placement.end_utc,
                duration_minutes: placement.duration_minutes,
                weight_snapshot: 0.0,
                energy_resolved: placement.energy_resolved,
            },
        };
        let instance = match persister.insert(&input) {
            Ok(instance) => instance,
            Err(e) => {
                tracing::warn!(habit = %placement.habit_id, "failed to persist habit placement: {e}");
                state.failures.push(ScheduleFailure::from_store(&placement.habit_id, &e));
                failures += 1;
                continue;
            }
        };
        inserted += 1;

        let decision = if previously_scheduled.contains(&placement.habit_id) {
            Decision::Rescheduled
        } else {
            Decision::New
        };
        state.timeline.push(TimelineEntry::Habit(HabitEntry {
            habit_id: placement.habit_id,
            name: placement.name,
            habit_type: placement.habit_type,
            window_id: Some(placement.window_id),
            window_label: Some(placement.window_label),
            start_utc: placement.start_utc,
            end_utc: placement.end_utc,
            duration_minutes: placement.duration_minutes,
            energy_resolved: Some(placement.energy_resolved),
            instance_id: Some(instance.id.clone()),
            decision,
            context: PlacementContext {
                scheduled_day_offset: placement.scheduled_day_offset,
                available_start: Some(placement.available_start),
                window_start: Some(placement.window_start),
            },
        }));
        state.placed.push(instance);
    }

    reporter.emit(ProgressEvent::HabitsPersisted { inserted, failures });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergyLevel;
    use crate::schedule::InstanceStatus;
    use crate::storage::{MemoryStore, StoreOp};
    use chrono::TimeZone;
    use std::cell::RefCell;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn window(id: &str, start: &str, end: &str, energy: EnergyLevel) -> Window {
        Window {
            id: id.into(),
            label: id.into(),
            energy: Some(energy),
            start_local: start.into(),
            end_local: end.into(),
            days: None,
            location_context: None,
            from_prev_day: false,
        }
    }

    fn project(id: &str, minutes: i64, energy: EnergyLevel) -> Project {
        Project {
            id: id.into(),
            name: id.into(),
            priority: "HIGH".into(),
            stage: "BUILD".into(),
            energy: Some(energy),
            duration_minutes: Some(minutes),
            goal_id: None,
            skill_ids: Vec::new(),
        }
    }

    fn options(horizon: u32) -> ScheduleOptions {
        ScheduleOptions::default()
            .with_horizon_days(horizon)
            .with_now(at(2, 6, 0))
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.scheduler.time_zone = "Europe/Berlin".into();
        config.scheduler.mode = "rush".into();
        config.scheduler.horizon_days = 1000;
        let options = ScheduleOptions::from_config(&config).unwrap();
        assert_eq!(options.time_zone, chrono_tz::Europe::Berlin);
        assert_eq!(options.mode, SchedulerMode::Rush);
        assert_eq!(options.horizon_days, MAX_HORIZON_DAYS);

        config.scheduler.time_zone = "Mars/Olympus".into();
        assert!(ScheduleOptions::from_config(&config).is_err());
    }

    #[test]
    fn test_project_written_and_reported() {
        let store = MemoryStore::new("u")
            .with_window(window("w", "09:00", "12:00", EnergyLevel::High))
            .with_project(project("p1", 90, EnergyLevel::Medium));
        let events = RefCell::new(Vec::new());
        let sink = |e: &ProgressEvent| events.borrow_mut().push(e.kind());

        let result = schedule_backlog(&store, "u", base(), &options(3), Some(&sink)).unwrap();
        assert!(result.error.is_none());
        assert_eq!(result.placed.len(), 1);
        assert_eq!(result.placed[0].start_utc, at(2, 9, 0));
        assert_eq!(result.placed[0].end_utc, at(2, 10, 30));
        assert_eq!(result.timeline[0].decision(), Decision::New);
        assert_eq!(
            *events.borrow(),
            vec![
                "start",
                "missed-fetched",
                "inputs-fetched",
                "queue-built",
                "dedupe-complete",
                "habit-pass-complete",
                "projects-scheduled",
                "habit-pass-complete",
                "habits-persisted",
                "complete",
            ]
        );
    }

    #[test]
    fn test_fetch_failure_aborts_before_writes() {
        let store = MemoryStore::new("u")
            .with_window(window("w", "09:00", "12:00", EnergyLevel::High))
            .with_project(project("p1", 30, EnergyLevel::Low));
        store.fail(StoreOp::Habits);
        let events = RefCell::new(Vec::new());
        let sink = |e: &ProgressEvent| events.borrow_mut().push(e.clone());

        let result = schedule_backlog(&store, "u", base(), &options(3), Some(&sink)).unwrap();
        let error = result.error.unwrap();
        assert_eq!(error.stage, "inputs");
        assert_eq!(error.code, "query");
        assert!(result.placed.is_empty());
        assert_eq!(store.write_count(), 0);
        assert!(events.borrow().iter().any(|e| e.kind() == "error"));
    }

    #[test]
    fn test_write_failure_fails_only_that_item() {
        let store = MemoryStore::new("u")
            .with_window(window("w", "09:00", "12:00", EnergyLevel::High))
            .with_project(project("bad", 30, EnergyLevel::Low))
            .with_project(project("good", 30, EnergyLevel::Low));
        store.fail_writes_for("bad");

        let result = schedule_backlog(&store, "u", base(), &options(1), None).unwrap();
        assert_eq!(result.placed.len(), 1);
        assert_eq!(result.placed[0].source_id, "good");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].reason, FailureReason::Error);
        assert_eq!(result.placed[0].start_utc, at(2, 9, 0));
    }

    #[test]
    fn test_stale_scheduled_rows_flip_to_missed() {
        let stale = ScheduleInstance {
            id: "old".into(),
            user_id: "u".into(),
            source_type: SourceType::Project,
            source_id: "gone".into(),
            window_id: None,
            start_utc: at(1, 9, 0),
            end_utc: at(1, 10, 0),
            duration_minutes: 60,
            status: InstanceStatus::Scheduled,
            weight_snapshot: None,
            energy_resolved: None,
            completed_at: None,
        };
        let store = MemoryStore::new("u").with_instance(stale);
        schedule_backlog(&store, "u", base(), &options(1), None).unwrap();
        assert_eq!(store.instance("old").unwrap().status, InstanceStatus::Missed);
    }
}
