use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::normalize_context;
use crate::energy::EnergyLevel;

/// Kind of habit. Only [`HabitType::Sync`] may overlap other placements.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HabitType {
    #[default]
    Habit,
    Chore,
    Memo,
    #[serde(alias = "ASYNC")]
    Sync,
    Temp,
}

impl HabitType {
    /// Lenient parse used at the read boundary; unknown labels read as HABIT.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("CHORE") => HabitType::Chore,
            Some("MEMO") => HabitType::Memo,
            Some("SYNC") | Some("ASYNC") => HabitType::Sync,
            Some("TEMP") => HabitType::Temp,
            _ => HabitType::Habit,
        }
    }

    /// Tie-break rank among habits due at the same instant.
    pub fn sort_rank(self) -> u8 {
        match self {
            HabitType::Chore => 0,
            HabitType::Habit | HabitType::Temp => 1,
            HabitType::Memo => 2,
            HabitType::Sync => 3,
        }
    }

    pub fn allows_overlap(self) -> bool {
        self == HabitType::Sync
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HabitType::Habit => "HABIT",
            HabitType::Chore => "CHORE",
            HabitType::Memo => "MEMO",
            HabitType::Sync => "SYNC",
            HabitType::Temp => "TEMP",
        }
    }
}

/// Part of the day a habit must fall in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DaylightPreference {
    #[default]
    AllDay,
    Day,
    Night,
}

impl DaylightPreference {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("DAY") => DaylightPreference::Day,
            Some("NIGHT") => DaylightPreference::Night,
            _ => DaylightPreference::AllDay,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DaylightPreference::AllDay => "ALL_DAY",
            DaylightPreference::Day => "DAY",
            DaylightPreference::Night => "NIGHT",
        }
    }
}

/// Which end of its remaining range an item prefers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindowEdgePreference {
    #[default]
    Front,
    Back,
}

impl WindowEdgePreference {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("BACK") => WindowEdgePreference::Back,
            _ => WindowEdgePreference::Front,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowEdgePreference::Front => "FRONT",
            WindowEdgePreference::Back => "BACK",
        }
    }
}

/// A recurring habit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub habit_type: HabitType,
    /// Free-form recurrence label: `daily`, `weekly`, `every 3 days`, ...
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub recurrence_days: Option<Vec<i32>>,
    #[serde(default)]
    pub energy: Option<EnergyLevel>,
    #[serde(default)]
    pub window_id: Option<String>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub location_context: Option<String>,
    #[serde(default)]
    pub daylight_preference: DaylightPreference,
    #[serde(default)]
    pub window_edge_preference: WindowEdgePreference,
    #[serde(default)]
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Habit {
    /// Create a daily habit with defaults for everything else.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration_minutes: None,
            habit_type: HabitType::Habit,
            recurrence: None,
            recurrence_days: None,
            energy: None,
            window_id: None,
            skill_id: None,
            goal_id: None,
            location_context: None,
            daylight_preference: DaylightPreference::AllDay,
            window_edge_preference: WindowEdgePreference::Front,
            last_completed_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Normalized location context (upper-cased, trimmed).
    pub fn location(&self) -> Option<String> {
        normalize_context(self.location_context.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_habit_type_parse_and_alias() {
        assert_eq!(HabitType::parse(Some("async")), HabitType::Sync);
        assert_eq!(HabitType::parse(Some("chore")), HabitType::Chore);
        assert_eq!(HabitType::parse(Some("whatever")), HabitType::Habit);
        assert_eq!(HabitType::parse(None), HabitType::Habit);

        let parsed: HabitType = serde_json::from_str("\"ASYNC\"").unwrap();
        assert_eq!(parsed, HabitType::Sync);
        assert_eq!(HabitType::default(), HabitType::Habit);
    }

    #[test]
    fn test_sort_rank_orders_chores_first() {
        assert!(HabitType::Chore.sort_rank() < HabitType::Habit.sort_rank());
        assert_eq!(HabitType::Habit.sort_rank(), HabitType::Temp.sort_rank());
        assert!(HabitType::Memo.sort_rank() < HabitType::Sync.sort_rank());
    }

    #[test]
    fn test_habit_deserializes_with_defaults() {
        let habit: Habit = serde_json::from_str(r#"{"id":"h1","name":"Stretch"}"#).unwrap();
        assert_eq!(habit.habit_type, HabitType::Habit);
        assert_eq!(habit.daylight_preference, DaylightPreference::AllDay);
        assert_eq!(habit.window_edge_preference, WindowEdgePreference::Front);
        assert!(habit.recurrence.is_none());
    }
}
