use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::energy::EnergyLevel;

/// What a placement instance schedules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    Project,
    Habit,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Project => "PROJECT",
            SourceType::Habit => "HABIT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PROJECT" => Some(SourceType::Project),
            "HABIT" => Some(SourceType::Habit),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a placement instance. `Canceled` is a soft delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Scheduled,
    Completed,
    Missed,
    Canceled,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Scheduled => "scheduled",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Missed => "missed",
            InstanceStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(InstanceStatus::Scheduled),
            "completed" => Some(InstanceStatus::Completed),
            "missed" => Some(InstanceStatus::Missed),
            "canceled" | "cancelled" => Some(InstanceStatus::Canceled),
            _ => None,
        }
    }

    /// Scheduled, completed and missed rows all count as active placements.
    pub fn is_active(self) -> bool {
        self != InstanceStatus::Canceled
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted placement of a project or habit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleInstance {
    pub id: String,
    pub user_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub window_id: Option<String>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: InstanceStatus,
    pub weight_snapshot: Option<f64>,
    pub energy_resolved: Option<EnergyLevel>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduleInstance {
    /// Check if this instance overlaps `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_utc < end && self.end_utc > start
    }

    /// True when the instance already occupies exactly this slot.
    pub fn matches_placement(&self, placement: &InstancePlacement) -> bool {
        self.window_id == placement.window_id
            && self.start_utc == placement.start_utc
            && self.end_utc == placement.end_utc
            && self.duration_minutes == placement.duration_minutes
    }
}

/// Where and how an instance is placed; the mutable part of a row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstancePlacement {
    pub window_id: Option<String>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub weight_snapshot: f64,
    pub energy_resolved: EnergyLevel,
}

/// Input for inserting a new `scheduled` instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInstance {
    pub user_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    #[serde(flatten)]
    pub placement: InstancePlacement,
}
