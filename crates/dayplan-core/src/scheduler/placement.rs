//! Placement search: which of a day's windows can take an item, and where.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::mode::SchedulerMode;
use crate::energy::EnergyLevel;
use crate::schedule::{DaylightPreference, WindowEdgePreference};
use crate::sunlight::SunlightSpan;
use crate::timeline::OccupiedBlocks;
use crate::windows::{AvailabilityMap, ResolvedWindow, WindowKey};

/// Rank given to windows without an energy label: they admit anything on
/// a non-exact match and sort after every labeled window.
const UNLABELED_ENERGY_RANK: usize = EnergyLevel::ALL.len();

/// What is being placed.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub energy: EnergyLevel,
    pub duration_minutes: i64,
    /// Require the window's energy to equal the item's.
    pub exact_energy: bool,
    /// Required normalized location context.
    pub location: Option<String>,
    pub daylight: DaylightPreference,
    pub anchor: WindowEdgePreference,
    /// Earliest allowed start besides the window itself.
    pub not_before: Option<DateTime<Utc>>,
    /// Overlap-permitted items skip availability bounds and occupied blocks.
    pub allow_overlap: bool,
}

impl PlacementRequest {
    /// Exclusive, non-exact, front-anchored request with no constraints.
    pub fn new(energy: EnergyLevel, duration_minutes: i64) -> Self {
        Self {
            energy,
            duration_minutes,
            exact_energy: false,
            location: None,
            daylight: DaylightPreference::AllDay,
            anchor: WindowEdgePreference::Front,
            not_before: None,
            allow_overlap: false,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes.max(0))
    }
}

/// Run state the search reads.
pub struct SearchContext<'a> {
    pub mode: &'a SchedulerMode,
    /// Floor for every placement; nothing lands before the clock.
    pub now: Option<DateTime<Utc>>,
    pub sunlight: Option<&'a SunlightSpan>,
    pub availability: &'a AvailabilityMap,
    pub occupied: &'a OccupiedBlocks,
}

/// A window that can take the item.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateWindow {
    pub window: ResolvedWindow,
    /// Window energy after the mode is applied.
    pub energy: Option<EnergyLevel>,
    /// Earliest allowed start inside the window.
    pub front: DateTime<Utc>,
    /// Latest allowed end inside the window.
    pub back: DateTime<Utc>,
    /// Where the item would start.
    pub available_start: DateTime<Utc>,
}

impl CandidateWindow {
    pub fn key(&self) -> &WindowKey {
        &self.window.key
    }

    pub fn id(&self) -> &str {
        self.window.id()
    }

    fn energy_rank(&self) -> usize {
        self.energy.map_or(UNLABELED_ENERGY_RANK, EnergyLevel::ordinal)
    }
}

/// Windows that can take `request`, best first.
///
/// # Arguments
/// * `windows` - The day's resolved windows
/// * `request` - The item and its constraints
/// * `ctx` - Mode, clock, sunlight and the run's bookkeeping
///
/// # Returns
/// Candidates ordered by available start, then energy rank (tightest
/// match first), then window start, then window id.
pub fn find_windows(
    windows: &[ResolvedWindow],
    request: &PlacementRequest,
    ctx: &SearchContext<'_>,
) -> Vec<CandidateWindow> {
    let duration = request.duration();
    let mut candidates: Vec<CandidateWindow> = windows
        .iter()
        .filter_map(|window| evaluate_window(window, request, duration, ctx))
        .collect();

    candidates.sort_by(|a, b| {
        a.available_start
            .cmp(&b.available_start)
            .then_with(|| a.energy_rank().cmp(&b.energy_rank()))
            .then_with(|| a.window.start.cmp(&b.window.start))
            .then_with(|| a.id().cmp(b.id()))
    });
    candidates
}

fn evaluate_window(
    window: &ResolvedWindow,
    request: &PlacementRequest,
    duration: Duration,
    ctx: &SearchContext<'_>,
) -> Option<CandidateWindow> {
    // 1. Energy
    let energy = ctx.mode.window_energy(window.window.energy);
    let admits = match energy {
        Some(level) if request.exact_energy => level == request.energy,
        Some(level) => level >= request.energy,
        None => !request.exact_energy,
    };
    if !admits {
        return None;
    }

    // 2. Location
    if let Some(required) = &request.location {
        if window.window.location().as_deref() != Some(required.as_str()) {
            return None;
        }
    }

    // 3. Clock and lower bounds
    let mut front = window.start;
    let mut back = window.end;
    if let Some(now) = ctx.now {
        if back <= now {
            return None;
        }
        front = front.max(now);
    }
    if let Some(not_before) = request.not_before {
        front = front.max(not_before);
    }

    // 4. Daylight
    if let Some(span) = ctx.sunlight {
        match request.daylight {
            DaylightPreference::AllDay => {}
            DaylightPreference::Day => {
                if let Some(sunrise) = span.current.sunrise {
                    front = front.max(sunrise);
                }
                if let Some(sunset) = span.current.sunset {
                    back = back.min(sunset);
                }
            }
            DaylightPreference::Night => {
                let today = &span.current;
                let dusk = today.dusk.or(today.sunset);
                let previous_dusk = span.previous.dusk.or(span.previous.sunset).or(dusk);
                let next_dawn = span.next.dawn.or(span.next.sunrise).or(today.sunrise);
                let early_morning = today.sunrise.is_some_and(|sunrise| window.start < sunrise);

                let (night_start, night_end) = if early_morning {
                    (previous_dusk, today.sunrise)
                } else {
                    (dusk, next_dawn)
                };
                if let Some(start) = night_start {
                    front = front.max(start);
                }
                if let Some(end) = night_end {
                    back = back.min(end);
                }
            }
        }
    }
    if front >= back {
        return None;
    }

    // 5. Availability bounds
    if !request.allow_overlap {
        let bounds = ctx.availability.bounds(window);
        front = front.max(bounds.front);
        back = back.min(bounds.back);
        if front >= back {
            return None;
        }
    }

    // 6. Anchor
    let mut start = match request.anchor {
        WindowEdgePreference::Front => front,
        WindowEdgePreference::Back => (back - duration).max(window.start),
    };
    start = start.max(front);
    if start + duration > back {
        return None;
    }

    // 7. Occupied blocks
    if !request.allow_overlap {
        start = match request.anchor {
            WindowEdgePreference::Front => ctx.occupied.first_fit(start, back, duration)?,
            WindowEdgePreference::Back => ctx.occupied.last_fit(front, start, duration)?,
        };
    }

    Some(CandidateWindow {
        window: window.clone(),
        energy,
        front,
        back,
        available_start: start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Window;
    use crate::sunlight::resolve_sunlight_span;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Tz;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn window(id: &str, start: &str, end: &str, energy: Option<EnergyLevel>) -> ResolvedWindow {
        let w = Window {
            id: id.into(),
            label: id.into(),
            energy,
            start_local: start.into(),
            end_local: end.into(),
            days: None,
            location_context: None,
            from_prev_day: false,
        };
        ResolvedWindow::resolve(&w, date(), Tz::UTC)
    }

    struct Fixture {
        mode: SchedulerMode,
        availability: AvailabilityMap,
        occupied: OccupiedBlocks,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                mode: SchedulerMode::Regular,
                availability: AvailabilityMap::new(),
                occupied: OccupiedBlocks::new(),
            }
        }

        fn ctx(&self) -> SearchContext<'_> {
            SearchContext {
                mode: &self.mode,
                now: None,
                sunlight: None,
                availability: &self.availability,
                occupied: &self.occupied,
            }
        }
    }

    #[test]
    fn test_energy_filter_and_order() {
        let fx = Fixture::new();
        let windows = vec![
            window("ultra", "09:00", "12:00", Some(EnergyLevel::Ultra)),
            window("low", "09:00", "12:00", Some(EnergyLevel::Low)),
            window("medium", "09:00", "12:00", Some(EnergyLevel::Medium)),
            window("blank", "09:00", "12:00", None),
        ];
        let found = find_windows(&windows, &PlacementRequest::new(EnergyLevel::Medium, 30), &fx.ctx());
        let ids: Vec<_> = found.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["medium", "ultra", "blank"]);

        let mut exact = PlacementRequest::new(EnergyLevel::Medium, 30);
        exact.exact_energy = true;
        let found = find_windows(&windows, &exact, &fx.ctx());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "medium");
    }

    #[test]
    fn test_rest_mode_caps_window_energy() {
        let mut fx = Fixture::new();
        fx.mode = SchedulerMode::Rest;
        let windows = vec![window("high", "09:00", "12:00", Some(EnergyLevel::High))];
        assert!(find_windows(&windows, &PlacementRequest::new(EnergyLevel::Medium, 30), &fx.ctx()).is_empty());
        let found = find_windows(&windows, &PlacementRequest::new(EnergyLevel::Low, 30), &fx.ctx());
        assert_eq!(found[0].energy, Some(EnergyLevel::Low));
    }

    #[test]
    fn test_now_clamp_and_expired_windows() {
        let fx = Fixture::new();
        let windows = vec![
            window("past", "06:00", "08:00", Some(EnergyLevel::High)),
            window("current", "09:00", "12:00", Some(EnergyLevel::High)),
        ];
        let mut ctx = fx.ctx();
        ctx.now = Some(at(10, 15));
        let found = find_windows(&windows, &PlacementRequest::new(EnergyLevel::Low, 30), &ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].available_start, at(10, 15));
    }

    #[test]
    fn test_back_anchor_and_occupied_blocks() {
        let mut fx = Fixture::new();
        fx.occupied.insert(at(11, 0), at(12, 0));
        let windows = vec![window("w", "09:00", "12:00", Some(EnergyLevel::High))];

        let mut request = PlacementRequest::new(EnergyLevel::Low, 30);
        request.anchor = WindowEdgePreference::Back;
        let found = find_windows(&windows, &request, &fx.ctx());
        assert_eq!(found[0].available_start, at(10, 30));

        fx.occupied.insert(at(9, 0), at(9, 45));
        let found = find_windows(&windows, &PlacementRequest::new(EnergyLevel::Low, 30), &fx.ctx());
        assert_eq!(found[0].available_start, at(9, 45));

        let mut overlap = PlacementRequest::new(EnergyLevel::Low, 30);
        overlap.allow_overlap = true;
        let found = find_windows(&windows, &overlap, &fx.ctx());
        assert_eq!(found[0].available_start, at(9, 0));
    }

    #[test]
    fn test_availability_bounds_narrow_window() {
        let mut fx = Fixture::new();
        let windows = vec![window("w", "09:00", "10:00", Some(EnergyLevel::High))];
        fx.availability.advance_front(&windows[0], at(9, 40));
        let found = find_windows(&windows, &PlacementRequest::new(EnergyLevel::Low, 30), &fx.ctx());
        assert!(found.is_empty());
        let found = find_windows(&windows, &PlacementRequest::new(EnergyLevel::Low, 20), &fx.ctx());
        assert_eq!(found[0].available_start, at(9, 40));
    }

    #[test]
    fn test_location_and_daylight() {
        let fx = Fixture::new();
        let mut home = window("home", "05:00", "09:00", Some(EnergyLevel::Low));
        home.window.location_context = Some("home".into());
        let windows = vec![home, window("any", "19:00", "23:00", Some(EnergyLevel::Low))];
        let span = resolve_sunlight_span(date(), Tz::UTC, None);

        let mut ctx = fx.ctx();
        ctx.sunlight = Some(&span);

        let mut request = PlacementRequest::new(EnergyLevel::Low, 30);
        request.location = Some("HOME".into());
        request.daylight = DaylightPreference::Day;
        let found = find_windows(&windows, &request, &ctx);
        assert_eq!(found.len(), 1);
        // Fixed sunrise is 06:00 without coordinates
        assert_eq!(found[0].available_start, at(6, 0));

        let mut night = PlacementRequest::new(EnergyLevel::Low, 30);
        night.daylight = DaylightPreference::Night;
        let found = find_windows(&windows, &night, &ctx);
        let ids: Vec<_> = found.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["home", "any"]);
        // Early-morning window is clamped to end at sunrise
        assert_eq!(found[0].back, at(6, 0));
        assert_eq!(found[1].available_start, at(19, 0));
    }
}
