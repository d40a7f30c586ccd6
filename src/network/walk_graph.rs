//! Pedestrian street graph with nearest-node lookup and distance-bounded
//! traversal.

use anyhow::{Result, bail};
use geo::Coord;
use ordered_float::OrderedFloat;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::IsochroneError;
use crate::geometry::PointIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkNode {
    pub osm_id: i64,
    pub location: Coord,
}

/// Walkable streets in the projected frame. Edges are undirected and
/// weighted by their length.
pub struct WalkGraph {
    graph: UnGraph<WalkNode, f64>,
    nodes: PointIndex<NodeIndex>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
struct State {
    cost: OrderedFloat<f64>,
    node: NodeIndex,
}

// Reversed so the max-heap pops the cheapest state first.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl WalkGraph {
    /// Builds the graph from projected nodes and `(u, v, length)` edges
    /// referring to node ids.
    pub fn from_parts(nodes: Vec<WalkNode>, edges: Vec<(i64, i64, f64)>) -> Result<Self> {
        let mut graph = UnGraph::with_capacity(nodes.len(), edges.len());
        let mut by_id = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if !(node.location.x.is_finite() && node.location.y.is_finite()) {
                bail!("walk node {} has a non-finite location", node.osm_id);
            }
            let idx = graph.add_node(node);
            if by_id.insert(node.osm_id, idx).is_some() {
                bail!("walk node {} is listed twice", node.osm_id);
            }
        }

        for (u, v, length) in edges {
            let (Some(&a), Some(&b)) = (by_id.get(&u), by_id.get(&v)) else {
                bail!("walk edge ({u}, {v}) references an unknown node");
            };
            if !(length.is_finite() && length >= 0.0) {
                bail!("walk edge ({u}, {v}) has invalid length {length}");
            }
            graph.add_edge(a, b, length);
        }

        let index = PointIndex::new(graph.node_indices().map(|idx| (graph[idx].location, idx)));

        Ok(Self {
            graph,
            nodes: index,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, idx: NodeIndex) -> &WalkNode {
        &self.graph[idx]
    }

    pub fn nearest_node(&self, at: Coord) -> std::result::Result<NodeIndex, IsochroneError> {
        if !(at.x.is_finite() && at.y.is_finite()) {
            return Err(IsochroneError::NonFiniteLocation { x: at.x, y: at.y });
        }
        self.nodes
            .nearest(at)
            .copied()
            .ok_or(IsochroneError::EmptyGraph)
    }

    /// Nodes whose shortest walking distance from `start` is at most
    /// `budget`, `start` included.
    pub fn reachable_within(&self, start: NodeIndex, budget: f64) -> Vec<NodeIndex> {
        let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(start, 0.0);
        heap.push(State {
            cost: OrderedFloat(0.0),
            node: start,
        });

        while let Some(State { cost, node }) = heap.pop() {
            if cost.0 > dist.get(&node).copied().unwrap_or(f64::INFINITY) {
                continue;
            }

            for edge in self.graph.edges(node) {
                let next = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                let next_cost = cost.0 + *edge.weight();
                if next_cost > budget {
                    continue;
                }
                if next_cost < dist.get(&next).copied().unwrap_or(f64::INFINITY) {
                    dist.insert(next, next_cost);
                    heap.push(State {
                        cost: OrderedFloat(next_cost),
                        node: next,
                    });
                }
            }
        }

        let mut reached: Vec<NodeIndex> = dist.into_keys().collect();
        reached.sort();
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 --60-- 1 --60-- 2 --60-- 3, plus a 10 m spur 1 -- 4.
    fn line_graph() -> WalkGraph {
        let nodes = vec![
            node(0, 0.0, 0.0),
            node(1, 60.0, 0.0),
            node(2, 120.0, 0.0),
            node(3, 180.0, 0.0),
            node(4, 60.0, 10.0),
        ];
        let edges = vec![(0, 1, 60.0), (1, 2, 60.0), (2, 3, 60.0), (1, 4, 10.0)];
        WalkGraph::from_parts(nodes, edges).unwrap()
    }

    #[test]
    fn test_budget_is_inclusive() {
        let graph = line_graph();
        let start = graph.nearest_node(Coord { x: 0.0, y: 0.0 }).unwrap();
        let reached = graph.reachable_within(start, 120.0);
        let mut ids: Vec<i64> = reached.iter().map(|n| graph.node(*n).osm_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_counts_nodes_and_edges() {
        let graph = line_graph();
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_zero_budget_reaches_only_start() {
        let graph = line_graph();
        let start = graph.nearest_node(Coord { x: 179.0, y: 3.0 }).unwrap();
        let reached = graph.reachable_within(start, 0.0);
        assert_eq!(reached.len(), 1);
        assert_eq!(graph.node(reached[0]).osm_id, 3);
    }

    #[test]
    fn test_shorter_detour_wins() {
        // Direct edge 0-2 is longer than going through 1.
        let nodes = vec![node(0, 0.0, 0.0), node(1, 50.0, 0.0), node(2, 100.0, 0.0)];
        let edges = vec![(0, 2, 500.0), (0, 1, 50.0), (1, 2, 50.0)];
        let graph = WalkGraph::from_parts(nodes, edges).unwrap();
        let start = graph.nearest_node(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert_eq!(graph.reachable_within(start, 100.0).len(), 3);
    }

    #[test]
    fn test_nearest_node_errors() {
        let empty = WalkGraph::from_parts(vec![], vec![]).unwrap();
        assert_eq!(
            empty.nearest_node(Coord { x: 0.0, y: 0.0 }),
            Err(IsochroneError::EmptyGraph)
        );
        let graph = line_graph();
        assert!(matches!(
            graph.nearest_node(Coord { x: f64::NAN, y: 0.0 }),
            Err(IsochroneError::NonFiniteLocation { .. })
        ));
    }

    #[test]
    fn test_from_parts_rejects_unknown_nodes() {
        let result = WalkGraph::from_parts(vec![node(0, 0.0, 0.0)], vec![(0, 7, 1.0)]);
        assert!(result.is_err());
    }

    fn node(osm_id: i64, x: f64, y: f64) -> WalkNode {
        WalkNode {
            osm_id,
            location: Coord { x, y },
        }
    }
}
