//! Stop significance model.
//!
//! Four independent factors are computed per stop and combined as
//! `significance = factor_e * factor_s * factor_f + factor_q`, where rail
//! stops use a fixed constant in place of `factor_q`. A factor with no data
//! for a stop counts as zero, so a stop without frequency data keeps only
//! its additive facility term.

pub mod facility;
pub mod frequency;
pub mod rail_proximity;
pub mod route_diversity;

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::config::ScoringConfig;
use crate::model::{Isochrone, RouteMode, ScheduleEvent, SignificanceArea, Stop, StopId};

/// Factors and combined significance of one stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopFactors {
    pub stop_id: StopId,
    pub route_type: u16,
    pub factor_e: f64,
    pub factor_s: f64,
    pub factor_f: f64,
    pub factor_q: f64,
    pub significance: f64,
}

/// Product of the three multiplicative factors.
pub fn transit_product(factor_e: f64, factor_s: f64, factor_f: f64) -> f64 {
    factor_e * factor_s * factor_f
}

pub fn combine(factor_e: f64, factor_s: f64, factor_f: f64, facility: f64) -> f64 {
    transit_product(factor_e, factor_s, factor_f) + facility
}

/// Stop collections the factors read from.
///
/// `in_scope` is the study-area stop set being scored; `population` is
/// every known stop and only feeds the rail-connectivity lookups.
pub struct SignificanceInputs<'a> {
    pub in_scope: &'a [Stop],
    pub population: &'a [Stop],
    pub near_rail: &'a [Isochrone],
    pub schedule: &'a [ScheduleEvent],
}

impl<'a> SignificanceInputs<'a> {
    fn in_scope_where(&self, family: fn(RouteMode) -> bool) -> Vec<&'a Stop> {
        self.in_scope.iter().filter(|s| family(s.mode)).collect()
    }

    fn population_where(&self, family: fn(RouteMode) -> bool) -> Vec<&'a Stop> {
        self.population.iter().filter(|s| family(s.mode)).collect()
    }
}

fn assemble(
    stops: &[&Stop],
    factor_e: &HashMap<StopId, f64>,
    factor_s: &HashMap<StopId, f64>,
    factor_f: &HashMap<StopId, f64>,
    facility: impl Fn(&Stop) -> f64,
) -> Vec<StopFactors> {
    let lookup = |table: &HashMap<StopId, f64>, id: &str| table.get(id).copied().unwrap_or(0.0);

    stops
        .iter()
        .map(|stop| {
            let e = lookup(factor_e, &stop.id);
            let s = lookup(factor_s, &stop.id);
            let f = lookup(factor_f, &stop.id);
            let q = facility(stop);
            StopFactors {
                stop_id: stop.id.clone(),
                route_type: stop.mode.gtfs_code(),
                factor_e: e,
                factor_s: s,
                factor_f: f,
                factor_q: q,
                significance: combine(e, s, f, q),
            }
        })
        .collect()
}

/// Significance of every in-scope bus stop.
#[tracing::instrument(skip_all)]
pub fn bus_significance(inputs: &SignificanceInputs, config: &ScoringConfig) -> Vec<StopFactors> {
    let bus_stops = inputs.in_scope_where(RouteMode::is_bus);
    let bus_population = inputs.population_where(RouteMode::is_bus);
    let rail_stops = inputs.in_scope_where(RouteMode::is_rail);

    let factor_e = route_diversity::compute_factor_e(bus_stops.iter().copied());
    let factor_s = rail_proximity::bus_factor_s(
        &bus_stops,
        &bus_population,
        &rail_stops,
        inputs.near_rail,
        config.rail_search_radius,
    );
    let scope: HashSet<&str> = bus_stops.iter().map(|s| s.id.as_str()).collect();
    let events = frequency::select_events(inputs.schedule, &scope, RouteMode::is_bus);
    let factor_f = frequency::compute_factor_f(&events, config);
    let factor_q = facility::compute_factor_q(bus_stops.iter().copied());

    let factors = assemble(&bus_stops, &factor_e, &factor_s, &factor_f, |stop| {
        factor_q.get(&stop.id).copied().unwrap_or(0.0)
    });
    info!(
        stops = factors.len(),
        with_frequency = factor_f.len(),
        events = events.len(),
        "Bus significance computed"
    );
    factors
}

/// Significance of every in-scope rail stop.
#[tracing::instrument(skip_all)]
pub fn rail_significance(inputs: &SignificanceInputs, config: &ScoringConfig) -> Vec<StopFactors> {
    let rail_stops = inputs.in_scope_where(RouteMode::is_rail);
    let bus_population = inputs.population_where(RouteMode::is_bus);

    let factor_e = route_diversity::compute_factor_e(rail_stops.iter().copied());
    let factor_s = rail_proximity::rail_factor_s(&bus_population, inputs.near_rail);
    let scope: HashSet<&str> = rail_stops.iter().map(|s| s.id.as_str()).collect();
    let events = frequency::select_events(inputs.schedule, &scope, RouteMode::is_rail);
    let factor_f = frequency::compute_factor_f(&events, config);

    let factors = assemble(&rail_stops, &factor_e, &factor_s, &factor_f, |_| {
        config.rail_facility_score
    });
    info!(
        stops = factors.len(),
        with_frequency = factor_f.len(),
        events = events.len(),
        "Rail significance computed"
    );
    factors
}

/// Joins wide isochrones with the significance of their stops. Isochrones
/// whose stop has no factor record keep `None`.
pub fn attach_significance(isochrones: &[Isochrone], factors: &[StopFactors]) -> Vec<SignificanceArea> {
    let by_stop: HashMap<&str, f64> = factors
        .iter()
        .map(|f| (f.stop_id.as_str(), f.significance))
        .collect();

    isochrones
        .iter()
        .map(|iso| SignificanceArea {
            stop_id: iso.stop_id.clone(),
            polygon: iso.polygon.clone(),
            significance: by_stop.get(iso.stop_id.as_str()).copied(),
        })
        .collect()
}
