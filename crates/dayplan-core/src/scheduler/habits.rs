//! Per-day habit placement.
//!
//! Regular habits are placed exclusively: each takes availability and
//! occupied time from the day. SYNC habits run in a later pass, may
//! overlap anything, and line up on a shared start inside each window.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use super::mode::SchedulerMode;
use super::placement::{find_windows, CandidateWindow, PlacementRequest, SearchContext};
use crate::energy::EnergyLevel;
use crate::recurrence::{evaluate_due, DueContext, DueEvaluation};
use crate::schedule::{Habit, HabitType, WindowEdgePreference, Window};
use crate::sunlight::SunlightSpan;
use crate::timeline::OccupiedBlocks;
use crate::timezone::start_of_day;
use crate::windows::{AvailabilityMap, ResolvedWindow, WindowKey};

/// Duration used for habits stored without one.
pub const DEFAULT_HABIT_DURATION_MINUTES: i64 = 15;

/// Which habit pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitStage {
    Regular,
    Sync,
}

impl HabitStage {
    pub fn as_str(self) -> &'static str {
        match self {
            HabitStage::Regular => "regular",
            HabitStage::Sync => "sync",
        }
    }
}

/// One day of the horizon, resolved.
pub struct DayContext<'a> {
    pub date: NaiveDate,
    pub offset: i64,
    pub time_zone: Tz,
    /// Floor for every placement; nothing lands before the clock.
    pub now: Option<DateTime<Utc>>,
    pub windows: &'a [ResolvedWindow],
    pub sunlight: &'a SunlightSpan,
    pub mode: &'a SchedulerMode,
}

/// A habit placed by a pass, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitPlacement {
    pub habit_id: String,
    pub name: String,
    pub habit_type: HabitType,
    pub window_id: String,
    pub window_label: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub energy_resolved: EnergyLevel,
    pub scheduled_day_offset: i64,
    pub available_start: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
}

/// Habit pass over the horizon, one day at a time.
pub struct HabitPass<'a> {
    habits: &'a [Habit],
    windows_by_id: &'a HashMap<String, Window>,
    stage: HabitStage,
    /// Chores placed earlier in the pass count as done on their day.
    projected_completion: HashMap<String, NaiveDate>,
}

impl<'a> HabitPass<'a> {
    pub fn new(habits: &'a [Habit], windows_by_id: &'a HashMap<String, Window>, stage: HabitStage) -> Self {
        Self {
            habits,
            windows_by_id,
            stage,
            projected_completion: HashMap::new(),
        }
    }

    pub fn stage(&self) -> HabitStage {
        self.stage
    }

    /// Place every habit due on `day`.
    ///
    /// # Returns
    /// Placements in start order.
    pub fn place_day(
        &mut self,
        day: &DayContext<'_>,
        availability: &mut AvailabilityMap,
        occupied: &mut OccupiedBlocks,
    ) -> Vec<HabitPlacement> {
        if self.habits.is_empty() || day.windows.is_empty() {
            return Vec::new();
        }

        // 1. Due habits in placement order
        let day_start = start_of_day(day.date, day.time_zone);
        let mut due: Vec<(&Habit, DueEvaluation)> = self
            .habits
            .iter()
            .filter_map(|habit| {
                let window_days = habit
                    .window_id
                    .as_ref()
                    .and_then(|id| self.windows_by_id.get(id))
                    .and_then(|w| w.days.as_deref());
                let ctx = DueContext::new(day.time_zone)
                    .with_window_days(window_days)
                    .with_projected_completion(self.projected_completion.get(&habit.id).copied());
                let eval = evaluate_due(habit, day.date, &ctx);
                eval.is_due.then_some((habit, eval))
            })
            .collect();
        due.sort_by(|(a, ea), (b, eb)| {
            let due_a = ea.due_start.unwrap_or(day_start);
            let due_b = eb.due_start.unwrap_or(day_start);
            due_a
                .cmp(&due_b)
                .then_with(|| a.habit_type.sort_rank().cmp(&b.habit_type.sort_rank()))
                .then_with(|| created_millis(a).cmp(&created_millis(b)))
                .then_with(|| a.name.cmp(&b.name))
        });

        // 2. Place each in its best window
        let mut sync_anchors: HashMap<WindowKey, Vec<DateTime<Utc>>> = HashMap::new();
        let mut placements = Vec::new();
        for (habit, eval) in due {
            let Some(placement) = self.place_habit(habit, &eval, day, availability, occupied, &mut sync_anchors) else {
                tracing::debug!(habit = %habit.id, date = %day.date, "no window for habit");
                continue;
            };
            if habit.habit_type == HabitType::Chore {
                self.projected_completion.insert(habit.id.clone(), day.date);
            }
            placements.push(placement);
        }

        placements.sort_by_key(|p| p.start_utc);
        placements
    }

    fn place_habit(
        &self,
        habit: &Habit,
        eval: &DueEvaluation,
        day: &DayContext<'_>,
        availability: &mut AvailabilityMap,
        occupied: &mut OccupiedBlocks,
        sync_anchors: &mut HashMap<WindowKey, Vec<DateTime<Utc>>>,
    ) -> Option<HabitPlacement> {
        let duration_minutes = day.mode.adjust_duration(
            habit
                .duration_minutes
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_HABIT_DURATION_MINUTES),
        );
        if duration_minutes <= 0 {
            return None;
        }
        let own_window = habit.window_id.as_ref().and_then(|id| self.windows_by_id.get(id));
        let energy = habit
            .energy
            .or_else(|| own_window.and_then(|w| w.energy))
            .unwrap_or(EnergyLevel::No);
        let is_sync = habit.habit_type.allows_overlap();

        let request = PlacementRequest {
            energy,
            duration_minutes,
            exact_energy: true,
            location: habit.location(),
            daylight: habit.daylight_preference,
            anchor: habit.window_edge_preference,
            not_before: eval.due_start,
            allow_overlap: is_sync,
        };
        let candidates = {
            let ctx = SearchContext {
                mode: day.mode,
                now: day.now,
                sunlight: Some(day.sunlight),
                availability: &*availability,
                occupied: &*occupied,
            };
            find_windows(day.windows, &request, &ctx)
        };

        let duration = request.duration();
        for candidate in candidates {
            let start = if is_sync {
                match sync_start(&candidate, sync_anchors.get(candidate.key()), duration) {
                    Some(start) => start,
                    None => continue,
                }
            } else {
                candidate.available_start
            };
            let end = start + duration;

            // 3. Narrow the day for whatever comes next
            if is_sync {
                sync_anchors.entry(candidate.key().clone()).or_default().push(start);
            } else {
                match request.anchor {
                    WindowEdgePreference::Front => availability.advance_front(&candidate.window, end),
                    WindowEdgePreference::Back => availability.retreat_back(&candidate.window, start),
                }
                occupied.insert(start, end);
            }

            tracing::debug!(habit = %habit.id, window = %candidate.id(), start = %start, stage = self.stage.as_str(), "placed habit");
            return Some(HabitPlacement {
                habit_id: habit.id.clone(),
                name: habit.name.clone(),
                habit_type: habit.habit_type,
                window_id: candidate.id().to_string(),
                window_label: candidate.window.window.label.clone(),
                start_utc: start,
                end_utc: end,
                duration_minutes,
                energy_resolved: candidate.window.window.energy.unwrap_or(energy),
                scheduled_day_offset: day.offset,
                available_start: candidate.available_start,
                window_start: candidate.window.start,
            });
        }
        None
    }
}

/// Start for a SYNC habit: the first anchor already used in this window
/// that fits, else the earliest allowed start.
fn sync_start(
    candidate: &CandidateWindow,
    anchors: Option<&Vec<DateTime<Utc>>>,
    duration: Duration,
) -> Option<DateTime<Utc>> {
    let lower = candidate.available_start;
    let anchor = anchors.and_then(|anchors| {
        anchors
            .iter()
            .find(|a| **a >= lower && **a < candidate.back)
            .or_else(|| anchors.first())
            .copied()
    });
    let start = anchor.map_or(lower, |a| a.max(lower));
    (start + duration <= candidate.back).then_some(start)
}

fn created_millis(habit: &Habit) -> i64 {
    habit.created_at.map_or(0, |t| t.timestamp_millis())
}
