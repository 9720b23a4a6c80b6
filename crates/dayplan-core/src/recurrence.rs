//! Habit recurrence: is a habit due on a given calendar day?
//!
//! Two anchoring schemes exist:
//!
//! - **Calendar-anchored** (default): the habit repeats on a fixed grid
//!   measured from its creation date (weekday match, 14-day cadence,
//!   same day-of-month with end-of-month clamping, every N days).
//! - **Completion-anchored** (chores with an interval longer than a day):
//!   the next due day is the last completion day plus the interval, and the
//!   chore stays due until it is completed again.
//!
//! All arithmetic happens on local calendar days in the caller's zone.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::schedule::{Habit, HabitType};
use crate::timezone::{add_days, add_months, days_in_month, local_date, month_index, start_of_day, weekday};

/// Parsed recurrence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    BiMonthly,
    SemiAnnual,
    Yearly,
    EveryDays(u32),
}

/// Distance between two occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceInterval {
    Days(u32),
    Months(u32),
}

impl Recurrence {
    /// Parse a free-form label. Missing, empty and unknown labels read as daily.
    pub fn parse(value: Option<&str>) -> Self {
        let normalized = value.map(|v| v.trim().to_ascii_lowercase()).unwrap_or_default();
        match normalized.as_str() {
            "" | "daily" | "none" | "everyday" => Recurrence::Daily,
            "weekly" => Recurrence::Weekly,
            "bi-weekly" | "biweekly" => Recurrence::BiWeekly,
            "monthly" => Recurrence::Monthly,
            "bi-monthly" | "bimonthly" => Recurrence::BiMonthly,
            "every 6 months" => Recurrence::SemiAnnual,
            "yearly" | "annually" => Recurrence::Yearly,
            other => parse_every_days(other)
                .map(Recurrence::EveryDays)
                .unwrap_or(Recurrence::Daily),
        }
    }

    pub fn interval(self) -> RecurrenceInterval {
        match self {
            Recurrence::Daily => RecurrenceInterval::Days(1),
            Recurrence::Weekly => RecurrenceInterval::Days(7),
            Recurrence::BiWeekly => RecurrenceInterval::Days(14),
            Recurrence::Monthly => RecurrenceInterval::Months(1),
            Recurrence::BiMonthly => RecurrenceInterval::Months(2),
            Recurrence::SemiAnnual => RecurrenceInterval::Months(6),
            Recurrence::Yearly => RecurrenceInterval::Months(12),
            Recurrence::EveryDays(n) => RecurrenceInterval::Days(n),
        }
    }
}

impl RecurrenceInterval {
    /// The day an interval after `from`.
    pub fn advance(self, from: NaiveDate) -> NaiveDate {
        match self {
            RecurrenceInterval::Days(n) => add_days(from, i64::from(n)),
            RecurrenceInterval::Months(n) => add_months(from, i64::from(n)),
        }
    }

    fn spans_multiple_days(self) -> bool {
        match self {
            RecurrenceInterval::Days(n) => n > 1,
            RecurrenceInterval::Months(_) => true,
        }
    }
}

/// `every N day(s)` -> N
fn parse_every_days(value: &str) -> Option<u32> {
    let rest = value.strip_prefix("every")?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let unit = rest[digits.len()..].trim_start();
    if !unit.starts_with("day") {
        return None;
    }
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Why a habit was judged due or not due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DueReason {
    DueDaily,
    DueOnCadence,
    DueNoAnchor,
    DueNoCompletion,
    DueOverdue,
    WeekdayMismatch,
    OffCadence,
    BeforeAnchor,
    IntervalNotReached,
}

impl fmt::Display for DueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DueReason::DueDaily => "DUE_DAILY",
            DueReason::DueOnCadence => "DUE_ON_CADENCE",
            DueReason::DueNoAnchor => "DUE_NO_ANCHOR",
            DueReason::DueNoCompletion => "DUE_NO_COMPLETION",
            DueReason::DueOverdue => "DUE_OVERDUE",
            DueReason::WeekdayMismatch => "WEEKDAY_MISMATCH",
            DueReason::OffCadence => "OFF_CADENCE",
            DueReason::BeforeAnchor => "BEFORE_ANCHOR",
            DueReason::IntervalNotReached => "INTERVAL_NOT_REACHED",
        };
        f.write_str(label)
    }
}

/// Outcome of a due-ness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DueEvaluation {
    pub is_due: bool,
    /// Start of the day the habit became (or becomes) due.
    pub due_start: Option<DateTime<Utc>>,
    pub reason: DueReason,
}

impl DueEvaluation {
    fn due(due_start: DateTime<Utc>, reason: DueReason) -> Self {
        Self { is_due: true, due_start: Some(due_start), reason }
    }

    fn not_due(due_start: Option<DateTime<Utc>>, reason: DueReason) -> Self {
        Self { is_due: false, due_start, reason }
    }
}

/// Inputs that refine a due-ness check beyond the habit record itself.
#[derive(Debug, Clone, Copy)]
pub struct DueContext<'a> {
    pub time_zone: Tz,
    /// Weekdays of the habit's window, used when the habit has none of its own.
    pub window_days: Option<&'a [u8]>,
    /// Completion day assumed for a chore placed earlier in the same run.
    pub projected_completion: Option<NaiveDate>,
}

impl<'a> DueContext<'a> {
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone, window_days: None, projected_completion: None }
    }

    pub fn with_window_days(mut self, days: Option<&'a [u8]>) -> Self {
        self.window_days = days;
        self
    }

    pub fn with_projected_completion(mut self, date: Option<NaiveDate>) -> Self {
        self.projected_completion = date;
        self
    }
}

/// Is `habit` due on `date`?
pub fn is_due(habit: &Habit, date: NaiveDate, time_zone: Tz, window_days: Option<&[u8]>) -> DueEvaluation {
    evaluate_due(habit, date, &DueContext::new(time_zone).with_window_days(window_days))
}

/// Full due-ness evaluation with run context.
pub fn evaluate_due(habit: &Habit, date: NaiveDate, ctx: &DueContext<'_>) -> DueEvaluation {
    let tz = ctx.time_zone;
    let recurrence = Recurrence::parse(habit.recurrence.as_deref());
    let interval = recurrence.interval();

    if habit.habit_type == HabitType::Chore && interval.spans_multiple_days() {
        return completion_anchored(habit, date, interval, ctx);
    }

    let day_start = start_of_day(date, tz);
    let explicit_days = normalize_days(habit.recurrence_days.as_deref())
        .or_else(|| normalize_days(ctx.window_days.map(widen).as_deref()));
    let today = weekday(date);

    if let Some(days) = &explicit_days {
        if !days.contains(&today) {
            return DueEvaluation::not_due(None, DueReason::WeekdayMismatch);
        }
    }

    if recurrence == Recurrence::Daily {
        return DueEvaluation::due(day_start, DueReason::DueDaily);
    }

    let anchor = match habit.created_at.or(habit.updated_at) {
        Some(anchor) => local_date(anchor, tz),
        None => return DueEvaluation::due(day_start, DueReason::DueNoAnchor),
    };
    let days_since = (date - anchor).num_days();
    if days_since < 0 {
        return DueEvaluation::not_due(None, DueReason::BeforeAnchor);
    }

    let on_cadence = match recurrence {
        Recurrence::Daily => true,
        Recurrence::Weekly => explicit_days.is_some() || today == weekday(anchor),
        Recurrence::BiWeekly => days_since % 14 == 0,
        Recurrence::Monthly => same_day_of_month_every(anchor, date, 1),
        Recurrence::BiMonthly => same_day_of_month_every(anchor, date, 2),
        Recurrence::SemiAnnual => same_day_of_month_every(anchor, date, 6),
        Recurrence::Yearly => same_day_of_month_every(anchor, date, 12),
        Recurrence::EveryDays(n) => days_since % i64::from(n) == 0,
    };

    if on_cadence {
        DueEvaluation::due(day_start, DueReason::DueOnCadence)
    } else {
        DueEvaluation::not_due(None, DueReason::OffCadence)
    }
}

fn completion_anchored(
    habit: &Habit,
    date: NaiveDate,
    interval: RecurrenceInterval,
    ctx: &DueContext<'_>,
) -> DueEvaluation {
    let tz = ctx.time_zone;
    let day_start = start_of_day(date, tz);
    let recorded = habit.last_completed_at.map(|at| local_date(at, tz));
    let last = match (recorded, ctx.projected_completion) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    let Some(last) = last else {
        return DueEvaluation::due(day_start, DueReason::DueNoCompletion);
    };

    let due_start = start_of_day(interval.advance(last), tz);
    if day_start >= due_start {
        DueEvaluation::due(due_start, DueReason::DueOverdue)
    } else {
        DueEvaluation::not_due(Some(due_start), DueReason::IntervalNotReached)
    }
}

fn same_day_of_month_every(anchor: NaiveDate, date: NaiveDate, months: i64) -> bool {
    let offset = month_index(date) - month_index(anchor);
    if offset < 0 || offset % months != 0 {
        return false;
    }
    let target_day = anchor.day().min(days_in_month(date.year(), date.month()));
    date.day() == target_day
}

fn widen(days: &[u8]) -> Vec<i32> {
    days.iter().map(|d| i32::from(*d)).collect()
}

/// Normalize weekday numbers modulo 7 and drop duplicates; empty lists read as absent.
fn normalize_days(days: Option<&[i32]>) -> Option<Vec<u8>> {
    let days = days?;
    let mut normalized: Vec<u8> = days.iter().map(|d| d.rem_euclid(7) as u8).collect();
    normalized.sort_unstable();
    normalized.dedup();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit(recurrence: &str, created: NaiveDate) -> Habit {
        let mut h = Habit::new("h1", "Test habit");
        h.recurrence = Some(recurrence.to_string());
        h.created_at = Some(Utc.from_utc_datetime(&created.and_hms_opt(12, 0, 0).unwrap()));
        h
    }

    #[test]
    fn test_parse_recurrence_labels() {
        assert_eq!(Recurrence::parse(None), Recurrence::Daily);
        assert_eq!(Recurrence::parse(Some("None")), Recurrence::Daily);
        assert_eq!(Recurrence::parse(Some("Bi-Weekly")), Recurrence::BiWeekly);
        assert_eq!(Recurrence::parse(Some("every 3 days")), Recurrence::EveryDays(3));
        assert_eq!(Recurrence::parse(Some("every 1 day")), Recurrence::EveryDays(1));
        assert_eq!(Recurrence::parse(Some("every 0 days")), Recurrence::Daily);
        assert_eq!(Recurrence::parse(Some("every 6 months")), Recurrence::SemiAnnual);
        assert_eq!(Recurrence::parse(Some("every x weeks")), Recurrence::Daily);
    }

    #[test]
    fn test_daily_is_always_due() {
        let h = habit("daily", date(2026, 3, 4));
        for d in 4..20 {
            assert!(is_due(&h, date(2026, 3, d), Tz::UTC, None).is_due);
        }
    }

    #[test]
    fn test_weekly_matches_anchor_weekday() {
        // 2026-03-04 is a Wednesday.
        let h = habit("weekly", date(2026, 3, 4));
        for d in 4..=31 {
            let day = date(2026, 3, d);
            let due = is_due(&h, day, Tz::UTC, None).is_due;
            assert_eq!(due, weekday(day) == 3, "day {d}");
        }
    }

    #[test]
    fn test_weekly_with_explicit_days() {
        let mut h = habit("weekly", date(2026, 3, 4));
        h.recurrence_days = Some(vec![1, 5]);
        assert!(is_due(&h, date(2026, 3, 9), Tz::UTC, None).is_due); // Monday
        assert!(is_due(&h, date(2026, 3, 13), Tz::UTC, None).is_due); // Friday
        let wed = is_due(&h, date(2026, 3, 11), Tz::UTC, None);
        assert!(!wed.is_due);
        assert_eq!(wed.reason, DueReason::WeekdayMismatch);
    }

    #[test]
    fn test_window_days_used_when_habit_has_none() {
        let h = habit("daily", date(2026, 3, 1));
        let window_days = [6u8];
        assert!(is_due(&h, date(2026, 3, 7), Tz::UTC, Some(&window_days)).is_due); // Saturday
        assert!(!is_due(&h, date(2026, 3, 6), Tz::UTC, Some(&window_days)).is_due);
    }

    #[test]
    fn test_biweekly_every_fourteen_days() {
        let anchor = date(2026, 3, 4);
        let h = habit("bi-weekly", anchor);
        for offset in 0..60 {
            let day = add_days(anchor, offset);
            assert_eq!(is_due(&h, day, Tz::UTC, None).is_due, offset % 14 == 0, "offset {offset}");
        }
    }

    #[test]
    fn test_biweekly_with_weekday_list_keeps_fourteen_day_cadence() {
        // Anchor is a Wednesday; only Mondays are allowed.
        let anchor = date(2026, 3, 4);
        let mut h = habit("bi-weekly", anchor);
        h.recurrence_days = Some(vec![1]);
        assert!(!is_due(&h, date(2026, 3, 16), Tz::UTC, None).is_due);
        assert!(!is_due(&h, date(2026, 3, 30), Tz::UTC, None).is_due);
        for offset in 0..120 {
            let day = add_days(anchor, offset);
            let eval = is_due(&h, day, Tz::UTC, None);
            assert_eq!(eval.is_due, offset % 14 == 0 && weekday(day) == 1, "offset {offset}");
        }

        h.recurrence_days = Some(vec![3]);
        assert!(is_due(&h, date(2026, 3, 18), Tz::UTC, None).is_due);
        let off = is_due(&h, date(2026, 3, 11), Tz::UTC, None);
        assert!(!off.is_due);
        assert_eq!(off.reason, DueReason::OffCadence);
    }

    #[test]
    fn test_monthly_clamps_to_end_of_month() {
        let h = habit("monthly", date(2026, 1, 31));
        assert!(is_due(&h, date(2026, 4, 30), Tz::UTC, None).is_due);
        assert!(!is_due(&h, date(2026, 4, 29), Tz::UTC, None).is_due);
        assert!(is_due(&h, date(2026, 2, 28), Tz::UTC, None).is_due);
        assert!(is_due(&h, date(2026, 3, 31), Tz::UTC, None).is_due);
    }

    #[test]
    fn test_bimonthly_and_yearly() {
        let bi = habit("bi-monthly", date(2026, 1, 10));
        assert!(!is_due(&bi, date(2026, 2, 10), Tz::UTC, None).is_due);
        assert!(is_due(&bi, date(2026, 3, 10), Tz::UTC, None).is_due);

        let yearly = habit("yearly", date(2024, 2, 29));
        assert!(is_due(&yearly, date(2025, 2, 28), Tz::UTC, None).is_due);
        assert!(!is_due(&yearly, date(2025, 8, 28), Tz::UTC, None).is_due);
    }

    #[test]
    fn test_every_n_days() {
        let anchor = date(2026, 3, 1);
        let h = habit("every 3 days", anchor);
        assert!(is_due(&h, anchor, Tz::UTC, None).is_due);
        assert!(!is_due(&h, date(2026, 3, 2), Tz::UTC, None).is_due);
        assert!(is_due(&h, date(2026, 3, 4), Tz::UTC, None).is_due);
    }

    #[test]
    fn test_not_due_before_anchor() {
        let h = habit("weekly", date(2026, 3, 11));
        let eval = is_due(&h, date(2026, 3, 4), Tz::UTC, None);
        assert!(!eval.is_due);
        assert_eq!(eval.reason, DueReason::BeforeAnchor);
    }

    #[test]
    fn test_chore_without_completion_is_due_now() {
        let mut h = habit("weekly", date(2026, 1, 1));
        h.habit_type = HabitType::Chore;
        let eval = is_due(&h, date(2026, 3, 3), Tz::UTC, None);
        assert!(eval.is_due);
        assert_eq!(eval.reason, DueReason::DueNoCompletion);
    }

    #[test]
    fn test_chore_is_completion_anchored() {
        let mut h = habit("every 3 days", date(2026, 1, 1));
        h.habit_type = HabitType::Chore;
        h.last_completed_at = Some(Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap());

        let early = is_due(&h, date(2026, 3, 12), Tz::UTC, None);
        assert!(!early.is_due);
        assert_eq!(early.reason, DueReason::IntervalNotReached);
        assert_eq!(early.due_start, Some(start_of_day(date(2026, 3, 13), Tz::UTC)));

        let on_time = is_due(&h, date(2026, 3, 13), Tz::UTC, None);
        assert!(on_time.is_due);
        let late = is_due(&h, date(2026, 3, 20), Tz::UTC, None);
        assert!(late.is_due);
        assert_eq!(late.due_start, Some(start_of_day(date(2026, 3, 13), Tz::UTC)));
    }

    #[test]
    fn test_projected_completion_defers_chore() {
        let mut h = habit("weekly", date(2026, 1, 1));
        h.habit_type = HabitType::Chore;
        let ctx = DueContext::new(Tz::UTC).with_projected_completion(Some(date(2026, 3, 3)));
        assert!(!evaluate_due(&h, date(2026, 3, 5), &ctx).is_due);
        assert!(evaluate_due(&h, date(2026, 3, 10), &ctx).is_due);
    }

    #[test]
    fn test_daily_chore_is_calendar_anchored() {
        let mut h = habit("daily", date(2026, 1, 1));
        h.habit_type = HabitType::Chore;
        h.last_completed_at = Some(Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap());
        assert!(is_due(&h, date(2026, 3, 10), Tz::UTC, None).is_due);
    }

    #[test]
    fn test_weekday_uses_local_zone() {
        // Created Wednesday 2026-03-04 23:30 in Los Angeles, which is Thursday in UTC.
        let tz = chrono_tz::America::Los_Angeles;
        let mut h = Habit::new("h", "Local");
        h.recurrence = Some("weekly".into());
        h.created_at = Some(Utc.with_ymd_and_hms(2026, 3, 5, 7, 30, 0).unwrap());
        assert!(is_due(&h, date(2026, 3, 11), tz, None).is_due);
        assert!(!is_due(&h, date(2026, 3, 12), tz, None).is_due);
    }
}
