//! Failure taxonomy of the scoring engine.
//!
//! Missing factor data is deliberately absent here: a stop without schedule
//! or amenity matches contributes zero, it does not fail.

/// Why a single stop produced no isochrone. Recorded per stop and never
/// propagated through the batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IsochroneError {
    #[error("walk graph has no nodes")]
    EmptyGraph,

    #[error("stop location ({x}, {y}) is not finite")]
    NonFiniteLocation { x: f64, y: f64 },
}

/// Fatal failures of the street-scoring stage.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("no bus or rail isochrones available to score")]
    EmptyInput,

    #[error("spatial join failed for {context}: {reason}")]
    SpatialJoin { context: String, reason: String },
}

impl ScoringError {
    pub fn spatial_join(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpatialJoin {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
