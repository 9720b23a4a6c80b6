//! Calendar arithmetic in an IANA time zone.
//!
//! The scheduler reasons about calendar days (`NaiveDate`) and converts to
//! absolute instants only at the edges. Local times that fall into a DST
//! gap resolve with the offset in effect just before the gap; ambiguous
//! local times resolve to the earlier instant.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ValidationError;

/// Parse an IANA zone name. Empty or missing names mean UTC.
pub fn parse_time_zone(value: Option<&str>) -> Result<Tz, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(Tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ValidationError::InvalidTimeZone(name.to_string())),
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) local time of day. `24:00` reads as midnight.
pub fn parse_local_time(value: &str) -> Result<NaiveTime, ValidationError> {
    let trimmed = value.trim();
    let mut parts = trimmed.split(':');
    let hour: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| ValidationError::InvalidTime(value.to_string()))?;
    let minute: u32 = match parts.next() {
        Some(p) => p
            .parse()
            .map_err(|_| ValidationError::InvalidTime(value.to_string()))?,
        None => 0,
    };
    let second: u32 = match parts.next() {
        Some(p) => p
            .parse()
            .map_err(|_| ValidationError::InvalidTime(value.to_string()))?,
        None => 0,
    };
    if hour == 24 && minute == 0 && second == 0 {
        return Ok(NaiveTime::MIN);
    }
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| ValidationError::InvalidTime(value.to_string()))
}

/// Convert a local wall-clock time to an absolute instant.
pub fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(resolved) = tz.from_local_datetime(&naive).earliest() {
        return resolved.with_timezone(&Utc);
    }
    // Inside a DST gap: apply the offset that was in effect before it.
    let probe = naive - Duration::hours(3);
    let offset = tz.offset_from_utc_datetime(&probe).fix();
    let utc = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Local calendar date of an instant.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Local midnight of `date` as an instant.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// `date` at local `time` as an instant.
pub fn at_local_time(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(time))
}

/// Weekday with 0=Sun ... 6=Sat.
pub fn weekday(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// Add calendar months, clamping the day to the target month's length.
pub fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let total = month_index(date) + months;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Months since year 0, for month-offset arithmetic.
pub fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Calendar-day difference between `base` and the local date of `instant`.
pub fn day_offset(base: NaiveDate, instant: DateTime<Utc>, tz: Tz) -> i64 {
    (local_date(instant, tz) - base).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_time_zone() {
        assert_eq!(parse_time_zone(None).unwrap(), Tz::UTC);
        assert_eq!(parse_time_zone(Some("  ")).unwrap(), Tz::UTC);
        assert_eq!(
            parse_time_zone(Some("Europe/Berlin")).unwrap(),
            chrono_tz::Europe::Berlin
        );
        assert!(matches!(
            parse_time_zone(Some("Mars/Olympus")),
            Err(ValidationError::InvalidTimeZone(_))
        ));
    }

    #[test]
    fn test_parse_local_time() {
        assert_eq!(parse_local_time("07:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(parse_local_time("23:15:00").unwrap(), NaiveTime::from_hms_opt(23, 15, 0).unwrap());
        assert_eq!(parse_local_time("24:00").unwrap(), NaiveTime::MIN);
        assert!(parse_local_time("7h").is_err());
        assert!(parse_local_time("25:00").is_err());
    }

    #[test]
    fn test_start_of_day_in_zone() {
        let tz = chrono_tz::America::New_York;
        let start = start_of_day(date(2026, 1, 15), tz);
        assert_eq!(start.to_rfc3339(), "2026-01-15T05:00:00+00:00");
    }

    #[test]
    fn test_resolve_local_in_dst_gap() {
        // 2026-03-08 02:30 does not exist in New York.
        let tz = chrono_tz::America::New_York;
        let naive = date(2026, 3, 8).and_hms_opt(2, 30, 0).unwrap();
        let resolved = resolve_local(tz, naive);
        assert_eq!(resolved.to_rfc3339(), "2026-03-08T07:30:00+00:00");
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(date(2026, 1, 31), 1), date(2026, 2, 28));
        assert_eq!(add_months(date(2026, 11, 30), 3), date(2027, 2, 28));
        assert_eq!(add_months(date(2026, 3, 15), -3), date(2025, 12, 15));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 4), 30);
        assert_eq!(days_in_month(2026, 12), 31);
    }

    #[test]
    fn test_weekday_sunday_is_zero() {
        // 2026-03-01 is a Sunday.
        assert_eq!(weekday(date(2026, 3, 1)), 0);
        assert_eq!(weekday(date(2026, 3, 4)), 3);
    }

    #[test]
    fn test_day_offset_uses_local_calendar() {
        let tz = chrono_tz::Asia::Tokyo;
        let base = date(2026, 5, 1);
        let instant = Utc.with_ymd_and_hms(2026, 5, 1, 16, 0, 0).unwrap(); // 01:00 May 2 in Tokyo
        assert_eq!(day_offset(base, instant, tz), 1);
    }
}
