//! Rail-connectivity factor.
//!
//! Bus stops score on how many of their own routes also feed a nearby rail
//! station; rail stations score on how many bus stops sit at their doorstep.
//! Both variants read the *full* bus population alongside the in-scope
//! stops, so the two collections are always passed in explicitly.

use geo::{Contains, Coord};
use std::collections::{BTreeSet, HashMap};

use crate::geometry::{PointIndex, PolygonIndex};
use crate::model::{Isochrone, RouteId, Stop, StopId};

/// `1 + 0.5 * min(matches, 2)`, so always within [1.0, 2.0].
pub fn score_s(matches: usize) -> f64 {
    1.0 + 0.5 * matches.min(2) as f64
}

/// Stops of `population` lying strictly inside each near isochrone, keyed
/// by the isochrone's stop id.
fn stops_inside_near_isochrones<'a>(
    population: &[&'a Stop],
    near_rail: &[Isochrone],
) -> HashMap<StopId, Vec<&'a Stop>> {
    let index = PolygonIndex::new(near_rail.iter().map(|iso| &iso.polygon));
    let mut inside: HashMap<StopId, Vec<&Stop>> = HashMap::new();

    for stop in population {
        for i in index.candidates(stop.location.0) {
            let iso = &near_rail[i];
            if iso.polygon.contains(&stop.location) {
                inside.entry(iso.stop_id.clone()).or_default().push(*stop);
            }
        }
    }

    inside
}

/// Union of the routes of every bus stop within walking reach of each rail
/// station.
pub fn feeder_routes(
    bus_population: &[&Stop],
    near_rail: &[Isochrone],
) -> HashMap<StopId, BTreeSet<RouteId>> {
    stops_inside_near_isochrones(bus_population, near_rail)
        .into_iter()
        .map(|(rail_id, stops)| {
            let routes = stops
                .iter()
                .flat_map(|stop| stop.routes.iter().cloned())
                .collect();
            (rail_id, routes)
        })
        .collect()
}

/// Bus variant.
///
/// * `bus_stops`: in-scope bus stops being scored
/// * `bus_population`: every known bus stop, used to build feeder route sets
/// * `rail_stops`: in-scope rail stops searched around each bus stop
/// * `near_rail`: near isochrones of those rail stops
pub fn bus_factor_s(
    bus_stops: &[&Stop],
    bus_population: &[&Stop],
    rail_stops: &[&Stop],
    near_rail: &[Isochrone],
    search_radius: f64,
) -> HashMap<StopId, f64> {
    let rail_index = PointIndex::new(rail_stops.iter().map(|s| (s.location.0, s.id.as_str())));
    let feeders = feeder_routes(bus_population, near_rail);

    bus_stops
        .iter()
        .map(|bus| {
            let at: Coord = bus.location.0;
            let mut nearby_rail = rail_index.strictly_within(at, search_radius).peekable();
            if nearby_rail.peek().is_none() {
                return (bus.id.clone(), 1.0);
            }

            let candidates: BTreeSet<&RouteId> = nearby_rail
                .filter_map(|rail_id| feeders.get(*rail_id))
                .flatten()
                .collect();
            let matched = bus.routes.iter().filter(|r| candidates.contains(r)).count();
            (bus.id.clone(), score_s(matched))
        })
        .collect()
}

/// Rail variant: one entry per near isochrone, scored by the number of bus
/// stops from `bus_population` inside it.
pub fn rail_factor_s(bus_population: &[&Stop], near_rail: &[Isochrone]) -> HashMap<StopId, f64> {
    let inside = stops_inside_near_isochrones(bus_population, near_rail);

    near_rail
        .iter()
        .map(|iso| {
            let count = inside.get(&iso.stop_id).map_or(0, Vec::len);
            (iso.stop_id.clone(), score_s(count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteMode;
    use geo::{Point, polygon};

    #[test]
    fn test_score_s_range() {
        assert_eq!(score_s(0), 1.0);
        assert_eq!(score_s(1), 1.5);
        assert_eq!(score_s(2), 2.0);
        assert_eq!(score_s(9), 2.0);
    }

    #[test]
    fn test_bus_without_nearby_rail_scores_one() {
        let bus = bus_stop("b", 0.0, 0.0, &["A", "B"]);
        let far_rail = Stop::new("r", RouteMode::Subway, Point::new(5000.0, 0.0));
        let near = vec![near_iso("r", 5000.0, 0.0)];
        let scores = bus_factor_s(&[&bus], &[&bus], &[&far_rail], &near, 3000.0);
        assert_eq!(scores["b"], 1.0);
    }

    #[test]
    fn test_bus_matches_routes_feeding_nearby_station() {
        // Feeder stop at the station door serves A, B and C; it is outside
        // the in-scope set but part of the full population.
        let feeder = bus_stop("feeder", 1000.0, 10.0, &["A", "B", "C"]);
        let scored = bus_stop("b", 0.0, 0.0, &["A", "C", "Z"]);
        let other = bus_stop("o", 0.0, 50.0, &["Z"]);
        let rail = Stop::new("r", RouteMode::Subway, Point::new(1000.0, 0.0));
        let near = vec![near_iso("r", 1000.0, 0.0)];

        let scores = bus_factor_s(
            &[&scored, &other],
            &[&scored, &other, &feeder],
            &[&rail],
            &near,
            3000.0,
        );
        assert_eq!(scores["b"], 2.0);
        // A nearby station whose feeders share nothing still gives 1.0.
        assert_eq!(scores["o"], 1.0);
    }

    #[test]
    fn test_rail_search_radius_is_exclusive() {
        let bus = bus_stop("b", 0.0, 0.0, &["A"]);
        let feeder = bus_stop("f", 3000.0, 10.0, &["A"]);
        let rail = Stop::new("r", RouteMode::Subway, Point::new(3000.0, 0.0));
        let near = vec![near_iso("r", 3000.0, 0.0)];
        let scores = bus_factor_s(&[&bus], &[&bus, &feeder], &[&rail], &near, 3000.0);
        assert_eq!(scores["b"], 1.0);
    }

    #[test]
    fn test_rail_counts_bus_stops_inside_near_isochrone() {
        let inside_a = bus_stop("a", 10.0, 10.0, &["1"]);
        let inside_b = bus_stop("b", -10.0, 5.0, &["2"]);
        let inside_c = bus_stop("c", 0.0, -20.0, &["3"]);
        let outside = bus_stop("d", 500.0, 0.0, &["4"]);
        let near = vec![near_iso("r1", 0.0, 0.0), near_iso("r2", 2000.0, 0.0)];

        let scores = rail_factor_s(&[&inside_a, &inside_b, &inside_c, &outside], &near);
        assert_eq!(scores["r1"], 2.0);
        assert_eq!(scores["r2"], 1.0);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn test_stop_on_isochrone_boundary_is_not_within() {
        let edge = bus_stop("e", 50.0, 0.0, &["1"]);
        let scores = rail_factor_s(&[&edge], &[near_iso("r", 0.0, 0.0)]);
        assert_eq!(scores["r"], 1.0);
    }

    fn bus_stop(id: &str, x: f64, y: f64, routes: &[&str]) -> Stop {
        Stop::new(id, RouteMode::Bus, Point::new(x, y)).with_routes(routes.iter().copied())
    }

    /// 100 x 100 square centred on (x, y).
    fn near_iso(stop_id: &str, x: f64, y: f64) -> Isochrone {
        Isochrone {
            stop_id: stop_id.into(),
            mode: RouteMode::Subway,
            polygon: polygon![
                (x: x - 50.0, y: y - 50.0),
                (x: x + 50.0, y: y - 50.0),
                (x: x + 50.0, y: y + 50.0),
                (x: x - 50.0, y: y + 50.0),
            ],
        }
    }
}
