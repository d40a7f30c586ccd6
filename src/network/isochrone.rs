//! Walking isochrones around stops.
//!
//! Each stop is located on the walk graph, expanded outwards within a
//! distance budget, and the reached nodes are wrapped in their convex hull.
//! Every stop is processed independently and yields an [`IsochroneOutcome`]
//! per radius; a failing stop never aborts the batch.

use geo::{Area, ConvexHull, MultiPoint, Point, Polygon};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::error::IsochroneError;
use crate::model::{Isochrone, RouteMode, Stop, StopId};
use crate::network::walk_graph::WalkGraph;

#[derive(Debug, Clone, PartialEq)]
pub enum IsochroneOutcome {
    Reached(Polygon),
    /// Too few reached nodes, or all of them collinear, to enclose an area.
    Degenerate { reached_nodes: usize },
    Failed(IsochroneError),
}

impl IsochroneOutcome {
    pub fn polygon(&self) -> Option<&Polygon> {
        match self {
            Self::Reached(polygon) => Some(polygon),
            _ => None,
        }
    }
}

/// Both isochrone outcomes for one stop. `near` is `None` for modes that do
/// not get a station-access isochrone.
#[derive(Debug, Clone, PartialEq)]
pub struct StopIsochrones {
    pub stop_id: StopId,
    pub mode: RouteMode,
    pub wide: IsochroneOutcome,
    pub near: Option<IsochroneOutcome>,
}

/// Isochrone sets consumed downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsochroneSets {
    pub wide_rail: Vec<Isochrone>,
    pub wide_bus: Vec<Isochrone>,
    pub near_rail: Vec<Isochrone>,
}

impl IsochroneSets {
    pub fn is_empty(&self) -> bool {
        self.wide_rail.is_empty() && self.wide_bus.is_empty() && self.near_rail.is_empty()
    }
}

/// Convex hull of the reached nodes when it has positive area.
fn hull_of(graph: &WalkGraph, reached: &[petgraph::graph::NodeIndex]) -> IsochroneOutcome {
    let points: MultiPoint = reached
        .iter()
        .map(|idx| Point::from(graph.node(*idx).location))
        .collect();
    let hull = points.convex_hull();
    if hull.unsigned_area() > 0.0 {
        IsochroneOutcome::Reached(hull)
    } else {
        IsochroneOutcome::Degenerate {
            reached_nodes: reached.len(),
        }
    }
}

pub fn isochrones_for_stop(stop: &Stop, graph: &WalkGraph, config: &ScoringConfig) -> StopIsochrones {
    let wants_near = stop.mode.is_station_mode();

    let center = match graph.nearest_node(stop.location.0) {
        Ok(center) => center,
        Err(e) => {
            return StopIsochrones {
                stop_id: stop.id.clone(),
                mode: stop.mode,
                wide: IsochroneOutcome::Failed(e.clone()),
                near: wants_near.then_some(IsochroneOutcome::Failed(e)),
            };
        }
    };

    let wide = hull_of(graph, &graph.reachable_within(center, config.wide_radius));
    let near = wants_near
        .then(|| hull_of(graph, &graph.reachable_within(center, config.near_radius)));

    StopIsochrones {
        stop_id: stop.id.clone(),
        mode: stop.mode,
        wide,
        near,
    }
}

/// Computes isochrones for every stop in parallel and partitions them into
/// wide rail, wide bus and near rail sets. Wide isochrones of other modes
/// are computed but not returned.
#[tracing::instrument(skip_all, fields(stops = stops.len()))]
pub fn compute_isochrones(stops: &[Stop], graph: &WalkGraph, config: &ScoringConfig) -> IsochroneSets {
    let outcomes: Vec<StopIsochrones> = stops
        .par_iter()
        .map(|stop| isochrones_for_stop(stop, graph, config))
        .collect();

    let mut sets = IsochroneSets::default();
    let mut failed = 0usize;
    let mut degenerate = 0usize;

    for outcome in outcomes {
        for (category, result) in [("wide", Some(&outcome.wide)), ("near", outcome.near.as_ref())] {
            match result {
                Some(IsochroneOutcome::Failed(e)) => {
                    failed += 1;
                    warn!(stop_id = %outcome.stop_id, category, error = %e, "Isochrone skipped");
                }
                Some(IsochroneOutcome::Degenerate { reached_nodes }) => {
                    degenerate += 1;
                    debug!(stop_id = %outcome.stop_id, category, reached_nodes, "No reachable area");
                }
                _ => {}
            }
        }

        if let Some(polygon) = outcome.wide.polygon() {
            let isochrone = Isochrone {
                stop_id: outcome.stop_id.clone(),
                mode: outcome.mode,
                polygon: polygon.clone(),
            };
            if outcome.mode.is_station_mode() {
                sets.wide_rail.push(isochrone);
            } else if outcome.mode.is_bus() {
                sets.wide_bus.push(isochrone);
            }
        }

        if let Some(polygon) = outcome.near.as_ref().and_then(IsochroneOutcome::polygon) {
            sets.near_rail.push(Isochrone {
                stop_id: outcome.stop_id,
                mode: outcome.mode,
                polygon: polygon.clone(),
            });
        }
    }

    info!(
        wide_rail = sets.wide_rail.len(),
        wide_bus = sets.wide_bus.len(),
        near_rail = sets.near_rail.len(),
        failed,
        degenerate,
        "Isochrones computed"
    );

    sets
}
