//! Walk network and the isochrone engine built on it.

pub mod isochrone;
pub mod walk_graph;

pub use isochrone::{IsochroneOutcome, IsochroneSets, StopIsochrones, compute_isochrones};
pub use walk_graph::{WalkGraph, WalkNode};
