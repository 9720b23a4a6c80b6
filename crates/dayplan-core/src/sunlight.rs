//! Sunrise, sunset and twilight bounds for daylight-constrained habits.
//!
//! With coordinates the bounds come from the `sunrise` crate's solar-day
//! model (civil twilight for dawn and dusk). Without coordinates a fixed
//! local day is assumed.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sunrise::{DawnType, SolarDay, SolarEvent};

use crate::timezone::{add_days, at_local_time};

/// Observer position in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// `None` unless both components are finite and in range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

/// Sun events for one local day. Polar days and nights leave events unset.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SunlightBounds {
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub dawn: Option<DateTime<Utc>>,
    pub dusk: Option<DateTime<Utc>>,
}

/// Bounds for a day and its neighbors, needed to clamp night ranges.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SunlightSpan {
    pub previous: SunlightBounds,
    pub current: SunlightBounds,
    pub next: SunlightBounds,
}

/// Sun events for `date` in `tz`.
pub fn resolve_sunlight_bounds(date: NaiveDate, tz: Tz, coordinates: Option<Coordinates>) -> SunlightBounds {
    match coordinates {
        Some(coords) => solar_bounds(date, tz, coords),
        None => fixed_bounds(date, tz),
    }
}

/// Bounds for `date - 1`, `date` and `date + 1`.
pub fn resolve_sunlight_span(date: NaiveDate, tz: Tz, coordinates: Option<Coordinates>) -> SunlightSpan {
    SunlightSpan {
        previous: resolve_sunlight_bounds(add_days(date, -1), tz, coordinates),
        current: resolve_sunlight_bounds(date, tz, coordinates),
        next: resolve_sunlight_bounds(add_days(date, 1), tz, coordinates),
    }
}

fn fixed_bounds(date: NaiveDate, tz: Tz) -> SunlightBounds {
    let at = |h: u32, m: u32| {
        NaiveTime::from_hms_opt(h, m, 0).map(|t| at_local_time(date, t, tz))
    };
    SunlightBounds {
        sunrise: at(6, 0),
        sunset: at(18, 0),
        dawn: at(5, 30),
        dusk: at(18, 30),
    }
}

fn solar_bounds(date: NaiveDate, tz: Tz, coords: Coordinates) -> SunlightBounds {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
    let reference = at_local_time(date, noon, tz);

    // Polar days and nights yield timestamps far from the requested day.
    let event = |kind: SolarEvent| {
        let day = SolarDay::new(sunrise::Coordinates::new(coords.latitude, coords.longitude)?, date);
        let instant = day.event_time(kind);
        ((instant - reference).abs() < Duration::hours(18)).then_some(instant)
    };

    SunlightBounds {
        sunrise: event(SolarEvent::Sunrise),
        sunset: event(SolarEvent::Sunset),
        dawn: event(SolarEvent::Dawn(DawnType::Civil)),
        dusk: event(SolarEvent::Dusk(DawnType::Civil)),
    }
}
