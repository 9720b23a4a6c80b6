//! Timeline records produced by a scheduling run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::energy::EnergyLevel;
use crate::schedule::{HabitType, ScheduleInstance};

/// What a run did with an item's placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// An existing placement was left as it was.
    Kept,
    /// A fresh placement was created.
    New,
    /// An existing placement was moved.
    Rescheduled,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Kept => "kept",
            Decision::New => "new",
            Decision::Rescheduled => "rescheduled",
        }
    }
}

/// Where an entry sits relative to the run's base date and its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacementContext {
    pub scheduled_day_offset: i64,
    pub available_start: Option<DateTime<Utc>>,
    pub window_start: Option<DateTime<Utc>>,
}

/// A project placement on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectEntry {
    pub project_id: String,
    pub instance: ScheduleInstance,
    pub decision: Decision,
    #[serde(flatten)]
    pub context: PlacementContext,
}

/// A habit placement on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitEntry {
    pub habit_id: String,
    pub name: String,
    pub habit_type: HabitType,
    pub window_id: Option<String>,
    pub window_label: Option<String>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub energy_resolved: Option<EnergyLevel>,
    /// Set once the placement has been persisted.
    pub instance_id: Option<String>,
    pub decision: Decision,
    #[serde(flatten)]
    pub context: PlacementContext,
}

/// One placement, project or habit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum TimelineEntry {
    Project(ProjectEntry),
    Habit(HabitEntry),
}

impl TimelineEntry {
    pub fn start_utc(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Project(p) => p.instance.start_utc,
            TimelineEntry::Habit(h) => h.start_utc,
        }
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Project(p) => p.instance.end_utc,
            TimelineEntry::Habit(h) => h.end_utc,
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            TimelineEntry::Project(p) => p.decision,
            TimelineEntry::Habit(h) => h.decision,
        }
    }

    pub fn context(&self) -> &PlacementContext {
        match self {
            TimelineEntry::Project(p) => &p.context,
            TimelineEntry::Habit(h) => &h.context,
        }
    }

    /// Stable `TYPE:id` key used to break start-time ties.
    pub fn sort_key(&self) -> String {
        match self {
            TimelineEntry::Project(p) => format!("PROJECT:{}", p.project_id),
            TimelineEntry::Habit(h) => format!("HABIT:{}", h.habit_id),
        }
    }
}

/// Order entries by start instant, then by [`TimelineEntry::sort_key`].
pub fn sort_timeline(entries: &mut [TimelineEntry]) {
    entries.sort_by(|a, b| {
        a.start_utc()
            .cmp(&b.start_utc())
            .then_with(|| a.sort_key().cmp(&b.sort_key()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn habit_entry(id: &str, hour: u32) -> TimelineEntry {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap();
        TimelineEntry::Habit(HabitEntry {
            habit_id: id.to_string(),
            name: id.to_string(),
            habit_type: HabitType::Habit,
            window_id: None,
            window_label: None,
            start_utc: start,
            end_utc: start + chrono::Duration::minutes(15),
            duration_minutes: 15,
            energy_resolved: None,
            instance_id: None,
            decision: Decision::New,
            context: PlacementContext {
                scheduled_day_offset: 0,
                available_start: None,
                window_start: None,
            },
        })
    }

    #[test]
    fn test_sort_timeline_breaks_ties_by_key() {
        let mut entries = vec![habit_entry("b", 9), habit_entry("a", 9), habit_entry("c", 8)];
        sort_timeline(&mut entries);
        let keys: Vec<_> = entries.iter().map(|e| e.sort_key()).collect();
        assert_eq!(keys, vec!["HABIT:c", "HABIT:a", "HABIT:b"]);
    }

    #[test]
    fn test_entry_serializes_with_type_tag() {
        let json = serde_json::to_value(habit_entry("h", 9)).unwrap();
        assert_eq!(json["type"], "HABIT");
        assert_eq!(json["decision"], "new");
        assert_eq!(json["scheduled_day_offset"], 0);
    }
}
