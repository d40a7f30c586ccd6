//! Peak-hour service frequency factor.
//!
//! For each weekday, peak arrivals are counted per
//! `(stop, route, direction, service)`, turned into hourly rates, averaged
//! per `(stop, route)`, then averaged over Monday to Friday and finally over
//! the routes of each stop.

use chrono::Weekday;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::ScoringConfig;
use crate::model::{RouteId, RouteMode, ScheduleEvent, StopId, WeekdayFlags};
use crate::stats::mean;

type StopRoute = (StopId, RouteId);

/// Converts an hourly peak rate into the frequency factor.
///
/// | Rate        | Score |
/// |-------------|-------|
/// | < 2         | 1.00  |
/// | < 3         | 1.25  |
/// | < 4         | 1.50  |
/// | <= 6        | 1.75  |
/// | > 6         | 2.00  |
pub fn score_f(rate: f64) -> f64 {
    match rate {
        r if r < 2.0 => 1.00,
        r if r < 3.0 => 1.25,
        r if r < 4.0 => 1.50,
        r if r <= 6.0 => 1.75,
        _ => 2.00,
    }
}

/// Events at `stops` whose route mode belongs to `family`.
pub fn select_events<'a>(
    schedule: &'a [ScheduleEvent],
    stops: &HashSet<&str>,
    family: impl Fn(RouteMode) -> bool,
) -> Vec<&'a ScheduleEvent> {
    schedule
        .iter()
        .filter(|e| family(e.mode) && stops.contains(e.stop_id.as_str()))
        .collect()
}

/// A weekday column is degenerate when it holds at most one distinct value,
/// in which case it cannot tell service days apart and is ignored.
fn is_degenerate(events: &[&ScheduleEvent], day: Weekday) -> bool {
    let values: HashSet<bool> = events.iter().filter_map(|e| e.weekdays.get(day)).collect();
    values.len() <= 1
}

/// Hourly peak rate per `(stop, route)` for one weekday.
pub fn weekday_rates(
    events: &[&ScheduleEvent],
    day: Weekday,
    config: &ScoringConfig,
) -> HashMap<StopRoute, f64> {
    let use_all = is_degenerate(events, day);

    let mut seen = HashSet::new();
    let mut counts: HashMap<(&str, &str, Option<u8>, &str), usize> = HashMap::new();

    for event in events {
        if !use_all && event.weekdays.get(day) != Some(true) {
            continue;
        }
        let key = (
            event.stop_id.as_str(),
            event.route_id.as_str(),
            event.arrival,
            event.departure,
        );
        if !seen.insert(key) {
            continue;
        }
        let Some(arrival) = event.arrival else {
            continue;
        };
        if !config.is_peak(arrival) {
            continue;
        }
        *counts
            .entry((
                event.stop_id.as_str(),
                event.route_id.as_str(),
                event.direction_id,
                event.service_id.as_str(),
            ))
            .or_default() += 1;
    }

    let mut group_rates: HashMap<StopRoute, Vec<f64>> = HashMap::new();
    for ((stop_id, route_id, _, _), count) in counts {
        group_rates
            .entry((stop_id.to_string(), route_id.to_string()))
            .or_default()
            .push(count as f64 / config.peak_span_hours);
    }

    debug!(?day, use_all, groups = group_rates.len(), "Weekday peak rates");

    group_rates
        .into_iter()
        .map(|(key, rates)| (key, mean(&rates)))
        .collect()
}

/// Average weekday peak rate per stop. Weekdays without service for a
/// `(stop, route)` count as zero.
pub fn stop_rates(events: &[&ScheduleEvent], config: &ScoringConfig) -> HashMap<StopId, f64> {
    let mut totals: HashMap<StopRoute, f64> = HashMap::new();
    for day in WeekdayFlags::WEEKDAYS {
        for (key, rate) in weekday_rates(events, day, config) {
            *totals.entry(key).or_default() += rate;
        }
    }

    let day_count = WeekdayFlags::WEEKDAYS.len() as f64;
    let mut per_stop: HashMap<StopId, Vec<f64>> = HashMap::new();
    for ((stop_id, _), total) in totals {
        per_stop.entry(stop_id).or_default().push(total / day_count);
    }

    per_stop
        .into_iter()
        .map(|(stop_id, rates)| (stop_id, mean(&rates)))
        .collect()
}

/// Frequency factor per stop. Stops without any peak arrival are absent.
pub fn compute_factor_f(events: &[&ScheduleEvent], config: &ScoringConfig) -> HashMap<StopId, f64> {
    stop_rates(events, config)
        .into_iter()
        .map(|(stop_id, rate)| (stop_id, score_f(rate)))
        .collect()
}
