use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::energy::EnergyLevel;
use crate::timezone::parse_local_time;

/// A recurring interval of the day during which items may be scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Window {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// `None` for windows stored without an energy label.
    #[serde(default)]
    pub energy: Option<EnergyLevel>,
    pub start_local: String, // HH:MM
    pub end_local: String,   // HH:MM
    /// Weekdays the window applies to, 0=Sun ... 6=Sat. `None` means every day.
    #[serde(default)]
    pub days: Option<Vec<u8>>,
    #[serde(default)]
    pub location_context: Option<String>,
    /// Set on copies of yesterday's midnight-crossing windows.
    #[serde(default)]
    pub from_prev_day: bool,
}

impl Window {
    /// Local start time; malformed values fall back to midnight.
    pub fn start_time(&self) -> NaiveTime {
        parse_local_time(&self.start_local).unwrap_or(NaiveTime::MIN)
    }

    /// Local end time; malformed values fall back to midnight.
    pub fn end_time(&self) -> NaiveTime {
        parse_local_time(&self.end_local).unwrap_or(NaiveTime::MIN)
    }

    /// True when the end is not after the start, i.e. the window runs past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.end_time() <= self.start_time()
    }

    /// True for windows with no weekday restriction.
    pub fn is_always(&self) -> bool {
        self.days.is_none()
    }

    /// Whether the window is scheduled on `weekday` (0=Sun).
    pub fn applies_on(&self, weekday: u8) -> bool {
        match &self.days {
            None => true,
            Some(days) => days.iter().any(|d| d % 7 == weekday),
        }
    }

    /// Normalized location context (upper-cased, trimmed).
    pub fn location(&self) -> Option<String> {
        normalize_context(self.location_context.as_deref())
    }
}

pub(crate) fn normalize_context(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_ascii_uppercase())
        .filter(|v| !v.is_empty())
}
