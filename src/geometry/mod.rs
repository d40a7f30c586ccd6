//! Planar geometry helpers: a local metric projection, sample-point
//! interpolation along road segments and R-tree indexes for spatial joins.

pub mod index;
pub mod interpolate;
pub mod projection;

pub use index::{PointIndex, PolygonIndex};
pub use interpolate::{interpolate_points, line_length, midpoint, sample_segments};
pub use projection::LocalProjection;
