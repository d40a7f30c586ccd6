//! Pipeline driver: from loaded inputs to the per-segment score table.
//!
//! Inputs arrive in lon/lat. Everything downstream of [`prepare_study_area`]
//! works in a local metric frame anchored at the first road coordinate.

use anyhow::{Context, Result, bail};
use geo::Coord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

use crate::config::ScoringConfig;
use crate::geometry::{LocalProjection, PointIndex, midpoint, sample_segments};
use crate::input::{self, InputPaths};
use crate::model::{RoadSegment, RouteId, RouteMode, ScheduleEvent, SignificanceArea, Stop, StopId};
use crate::network::{IsochroneSets, WalkGraph, WalkNode, compute_isochrones};
use crate::scoring::{StreetScoreRow, combine_scores};
use crate::significance::facility::FacilityTables;
use crate::significance::{self, SignificanceInputs, StopFactors};

/// Everything the engine reads for one run, as loaded from disk.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub schedule: Vec<ScheduleEvent>,
    /// Stop coordinates in lon/lat.
    pub stop_locations: HashMap<StopId, Coord>,
    pub walk_nodes: Vec<WalkNode>,
    pub walk_edges: Vec<(i64, i64, f64)>,
    pub roads: Vec<RoadSegment>,
    /// When present, only road segments with these link ids are scored.
    pub link_filter: Option<HashSet<String>>,
    pub facilities: FacilityTables,
}

impl PipelineInputs {
    /// Loads every input under `paths`. Schedule, stops, roads and the walk
    /// network are required; the link filter and facility tables are not.
    pub fn load(paths: &InputPaths, tag: Option<&str>) -> Result<Self> {
        let schedule = input::load_schedule(&paths.schedule)?
            .with_context(|| format!("schedule '{}' not found", paths.schedule.display()))?;
        let stop_locations = input::load_stop_locations(&paths.stops)?
            .with_context(|| format!("stops '{}' not found", paths.stops.display()))?;
        let roads = input::load_roads(&paths.roads)?
            .with_context(|| format!("roads '{}' not found", paths.roads.display()))?;
        let (walk_nodes, walk_edges) = input::load_walk_network(&paths.walk_nodes, &paths.walk_edges)?
            .with_context(|| {
                format!(
                    "walk network '{}' / '{}' not found",
                    paths.walk_nodes.display(),
                    paths.walk_edges.display()
                )
            })?;
        let link_filter = input::load_link_filter(&paths.link_points)?;
        let facilities = input::load_facility_tables(paths, tag)?;

        info!(
            events = schedule.len(),
            stops = stop_locations.len(),
            roads = roads.len(),
            walk_nodes = walk_nodes.len(),
            walk_edges = walk_edges.len(),
            link_filter = link_filter.is_some(),
            facility_tables = !facilities.is_empty(),
            "Inputs loaded"
        );

        Ok(Self {
            schedule,
            stop_locations,
            walk_nodes,
            walk_edges,
            roads,
            link_filter,
            facilities,
        })
    }
}

/// One stop record per `(stop_id, route_type)` pair seen in the schedule,
/// carrying the distinct routes of that pair. Stops without a known
/// location are dropped. Locations stay in the frame of `locations`.
pub fn stops_by_mode(schedule: &[ScheduleEvent], locations: &HashMap<StopId, Coord>) -> Vec<Stop> {
    let mut grouped: BTreeMap<(&str, &str, u16), BTreeSet<&str>> = BTreeMap::new();
    for event in schedule {
        grouped
            .entry((event.stop_id.as_str(), event.mode.label(), event.mode.gtfs_code()))
            .or_default()
            .insert(event.route_id.as_str());
    }

    let mut unlocated = 0usize;
    let stops: Vec<Stop> = grouped
        .into_iter()
        .filter_map(|((stop_id, _, code), routes)| {
            let Some(location) = locations.get(stop_id) else {
                unlocated += 1;
                return None;
            };
            Some(
                Stop::new(stop_id, RouteMode::from_gtfs(code), (*location).into())
                    .with_routes(routes.into_iter().map(RouteId::from)),
            )
        })
        .collect();

    if unlocated > 0 {
        warn!(unlocated, "Schedule stops without a location were dropped");
    }
    stops
}

/// Drops repeated link ids (first kept) and, when a filter is given, every
/// segment whose link id it does not list.
pub fn prepare_roads(roads: &[RoadSegment], filter: Option<&HashSet<String>>) -> Vec<RoadSegment> {
    let mut seen = HashSet::new();
    roads
        .iter()
        .filter(|r| filter.is_none_or(|f| f.contains(&r.link_id)))
        .filter(|r| seen.insert(r.link_id.as_str()))
        .cloned()
        .collect()
}

/// Stops within `buffer` of any road midpoint, boundary included, keeping
/// the first record of each stop id.
pub fn filter_study_area(stops: &[Stop], roads: &[RoadSegment], buffer: f64) -> Vec<Stop> {
    let midpoints = PointIndex::new(
        roads
            .iter()
            .filter_map(|r| midpoint(&r.geometry))
            .map(|p| (p.0, ())),
    );

    let mut seen = HashSet::new();
    stops
        .iter()
        .filter(|s| midpoints.within(s.location.0, buffer).next().is_some())
        .filter(|s| seen.insert(s.id.as_str()))
        .cloned()
        .collect()
}

/// Bus and rail presence in the stop population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub has_bus: bool,
    pub has_rail: bool,
}

impl Availability {
    pub fn of(stops: &[Stop]) -> Self {
        Self {
            has_bus: stops.iter().any(|s| s.mode.is_bus()),
            has_rail: stops.iter().any(|s| s.mode.is_rail()),
        }
    }

    pub fn log(&self) {
        match (self.has_bus, self.has_rail) {
            (true, true) => info!("Both bus and rail stops are available"),
            (false, true) => warn!("No bus stops found in this city"),
            (true, false) => warn!("No rail stops found in this city"),
            (false, false) => warn!("No bus or rail stops found in this city"),
        }
    }
}

/// Projected study area ready for isochrone computation.
pub struct StudyArea {
    pub projection: LocalProjection,
    /// Deduplicated road segments in the metric frame.
    pub roads: Vec<RoadSegment>,
    /// Every located stop.
    pub population: Vec<Stop>,
    /// Stops near the roads, with facility flags resolved.
    pub in_scope: Vec<Stop>,
    pub graph: WalkGraph,
    pub availability: Availability,
}

#[instrument(skip_all)]
pub fn prepare_study_area(inputs: &PipelineInputs, config: &ScoringConfig) -> Result<StudyArea> {
    let roads = prepare_roads(&inputs.roads, inputs.link_filter.as_ref());
    let Some(origin) = roads.iter().find_map(RoadSegment::first_coord) else {
        bail!("no road segments to score");
    };
    let projection = LocalProjection::new(origin);
    debug!(lon = origin.x, lat = origin.y, "Projection anchored");

    let roads: Vec<RoadSegment> = roads
        .into_iter()
        .map(|r| RoadSegment {
            geometry: projection.project_line(&r.geometry),
            ..r
        })
        .collect();

    let population: Vec<Stop> = stops_by_mode(&inputs.schedule, &inputs.stop_locations)
        .into_iter()
        .map(|s| Stop {
            location: projection.project_point(s.location),
            ..s
        })
        .collect();
    let availability = Availability::of(&population);
    availability.log();

    let in_scope = filter_study_area(&population, &roads, config.study_area_buffer);
    let in_scope = inputs.facilities.apply(&in_scope);
    let nodes = inputs
        .walk_nodes
        .iter()
        .map(|n| WalkNode {
            osm_id: n.osm_id,
            location: projection.project(n.location),
        })
        .collect();
    let graph = WalkGraph::from_parts(nodes, inputs.walk_edges.clone())
        .context("building walk graph")?;

    let origin = projection.origin();
    info!(
        stops = population.len(),
        in_scope = in_scope.len(),
        roads = roads.len(),
        walk_nodes = graph.node_count(),
        walk_edges = graph.edge_count(),
        origin_lon = origin.x,
        origin_lat = origin.y,
        "Study area prepared"
    );

    Ok(StudyArea {
        projection,
        roads,
        population,
        in_scope,
        graph,
        availability,
    })
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub stops: usize,
    pub stops_in_scope: usize,
    pub wide_bus: usize,
    pub wide_rail: usize,
    pub near_rail: usize,
    pub road_segments: usize,
    pub sample_points: usize,
    pub max_score: f64,
}

pub struct PipelineOutput {
    pub study_area: StudyArea,
    pub isochrones: IsochroneSets,
    pub bus_factors: Vec<StopFactors>,
    pub rail_factors: Vec<StopFactors>,
    pub rows: Vec<StreetScoreRow>,
    pub summary: RunSummary,
}

/// Runs the whole engine on `inputs`.
#[instrument(skip_all)]
pub fn run_pipeline(inputs: &PipelineInputs, config: &ScoringConfig) -> Result<PipelineOutput> {
    let study_area = prepare_study_area(inputs, config)?;
    let isochrones = compute_isochrones(&study_area.in_scope, &study_area.graph, config);

    let significance_inputs = SignificanceInputs {
        in_scope: &study_area.in_scope,
        population: &study_area.population,
        near_rail: &isochrones.near_rail,
        schedule: &inputs.schedule,
    };
    let bus_factors = significance::bus_significance(&significance_inputs, config);
    let rail_factors = significance::rail_significance(&significance_inputs, config);

    let bus_areas: Vec<SignificanceArea> =
        significance::attach_significance(&isochrones.wide_bus, &bus_factors);
    let rail_areas: Vec<SignificanceArea> =
        significance::attach_significance(&isochrones.wide_rail, &rail_factors);

    let points = sample_segments(&study_area.roads, config.sample_spacing);
    let rows = combine_scores(
        &points,
        &study_area.roads,
        Some(bus_areas.as_slice()),
        Some(rail_areas.as_slice()),
    )?;

    let summary = RunSummary {
        stops: study_area.population.len(),
        stops_in_scope: study_area.in_scope.len(),
        wide_bus: isochrones.wide_bus.len(),
        wide_rail: isochrones.wide_rail.len(),
        near_rail: isochrones.near_rail.len(),
        road_segments: study_area.roads.len(),
        sample_points: points.len(),
        max_score: rows.iter().map(|r| r.score).fold(0.0, f64::max),
    };
    info!(?summary, "Pipeline complete");

    Ok(PipelineOutput {
        study_area,
        isochrones,
        bus_factors,
        rail_factors,
        rows,
        summary,
    })
}
