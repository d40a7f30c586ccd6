use std::collections::HashMap;

use crate::model::{Stop, StopId};

/// Route-diversity factor: 0.5 plus 0.5 per serving route, capped at three
/// routes.
///
/// | Routes | Score |
/// |--------|-------|
/// | 0      | 0.5   |
/// | 1      | 1.0   |
/// | 2      | 1.5   |
/// | >= 3   | 2.0   |
pub fn score_e(route_count: usize) -> f64 {
    0.5 + 0.5 * route_count.min(3) as f64
}

pub fn compute_factor_e<'a>(stops: impl IntoIterator<Item = &'a Stop>) -> HashMap<StopId, f64> {
    stops
        .into_iter()
        .map(|stop| (stop.id.clone(), score_e(stop.routes.len())))
        .collect()
}
