//! Street scoring: per-segment aggregation of stop significance and the
//! bus/rail combination.

pub mod combine;
pub mod street;

pub use combine::{StreetScoreRow, apply_presentation, combine_scores, normalize};
pub use street::{PointCoverage, aggregate_segments, match_points, score_streets, segment_score};
