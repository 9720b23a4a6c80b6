//! Windows active on a calendar day.
//!
//! A date's windows are the windows scheduled on its weekday, the "always"
//! windows (`days = None`), and copies of the previous day's windows that
//! run past midnight into it. Each is resolved to absolute instants and
//! identified by a [`WindowKey`] so the same stored window on different
//! days is tracked independently.

mod availability;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::schedule::Window;
use crate::timezone::{add_days, at_local_time, weekday};

pub use availability::{AvailabilityBounds, AvailabilityMap};

/// Identity of one window occurrence: the stored window plus its absolute start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WindowKey {
    pub window_id: String,
    pub start: DateTime<Utc>,
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.window_id, self.start.to_rfc3339())
    }
}

/// A window occurrence with absolute bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedWindow {
    pub window: Window,
    pub key: WindowKey,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedWindow {
    /// Anchor `window` to `date` in `tz`. Windows copied from the previous
    /// day start on `date - 1`; midnight-crossing windows end a day later
    /// than they start.
    pub fn resolve(window: &Window, date: NaiveDate, tz: Tz) -> Self {
        let start_date = if window.from_prev_day { add_days(date, -1) } else { date };
        let end_date = if window.crosses_midnight() { add_days(start_date, 1) } else { start_date };
        let start = at_local_time(start_date, window.start_time(), tz);
        let end = at_local_time(end_date, window.end_time(), tz);
        Self {
            key: WindowKey { window_id: window.id.clone(), start },
            window: window.clone(),
            start,
            end,
        }
    }

    pub fn id(&self) -> &str {
        &self.window.id
    }
}

/// Windows active on `date`, in stored order: today's and always-windows
/// first, then previous-day carry-overs.
pub fn windows_for_date(all: &[Window], date: NaiveDate) -> Vec<Window> {
    let today = weekday(date);
    let yesterday = (today + 6) % 7;

    let mut seen = HashSet::new();
    let mut base: Vec<Window> = Vec::new();
    // Weekday-specific windows take precedence over always-windows with the same id.
    for window in all.iter().filter(|w| !w.is_always() && w.applies_on(today)) {
        if seen.insert(window.id.as_str()) {
            base.push(Window { from_prev_day: false, ..window.clone() });
        }
    }
    for window in all.iter().filter(|w| w.is_always()) {
        if seen.insert(window.id.as_str()) {
            base.push(Window { from_prev_day: false, ..window.clone() });
        }
    }

    let mut seen_prev = HashSet::new();
    let carried = all
        .iter()
        .filter(|w| w.crosses_midnight() && w.applies_on(yesterday))
        .filter(|w| seen_prev.insert(w.id.as_str()))
        .map(|w| Window { from_prev_day: true, ..w.clone() })
        .collect::<Vec<_>>();

    base.extend(carried);
    base
}

/// [`windows_for_date`] resolved to absolute bounds.
pub fn resolve_windows_for_date(all: &[Window], date: NaiveDate, tz: Tz) -> Vec<ResolvedWindow> {
    windows_for_date(all, date)
        .iter()
        .map(|w| ResolvedWindow::resolve(w, date, tz))
        .collect()
}
