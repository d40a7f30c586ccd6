use serde::Serialize;
use tracing::{info, instrument};

use super::street::score_streets;
use crate::config::ScoringConfig;
use crate::error::ScoringError;
use crate::model::{RoadSegment, SamplePoint, SegmentScore, SignificanceArea};

/// One road segment with its bus, rail and combined score.
///
/// The aggregate statistics come from the bus side when it was scored,
/// otherwise from the rail side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreetScoreRow {
    pub link_id: String,
    pub name: Option<String>,
    pub points_count: usize,
    pub stops_computecount: usize,
    pub sig_mean_mean: f64,
    #[serde(rename = "Score_Bus")]
    pub score_bus: f64,
    #[serde(rename = "Score_Rail")]
    pub score_rail: f64,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "Transit_score", skip_serializing_if = "Option::is_none")]
    pub transit_score: Option<f64>,
}

/// Presentation rescale: caps `score` at `cap` and maps `[0, cap]` onto
/// `[0, range]`.
pub fn normalize(score: f64, cap: f64, range: f64) -> f64 {
    score.min(cap) / cap * range
}

fn present(areas: Option<&[SignificanceArea]>) -> Option<&[SignificanceArea]> {
    areas.filter(|a| !a.is_empty())
}

/// Scores every segment against the bus and rail significance areas and
/// sums the two sides. A side that is absent or empty scores zero; if both
/// are, scoring fails with [`ScoringError::EmptyInput`].
#[instrument(skip_all, fields(segments = segments.len(), points = points.len()))]
pub fn combine_scores(
    points: &[SamplePoint],
    segments: &[RoadSegment],
    bus: Option<&[SignificanceArea]>,
    rail: Option<&[SignificanceArea]>,
) -> Result<Vec<StreetScoreRow>, ScoringError> {
    let bus = present(bus);
    let rail = present(rail);
    if bus.is_none() && rail.is_none() {
        return Err(ScoringError::EmptyInput);
    }

    let bus_scores = bus
        .map(|areas| score_streets(points, areas, segments))
        .transpose()?;
    let rail_scores = rail
        .map(|areas| score_streets(points, areas, segments))
        .transpose()?;

    let score_of = |side: &Option<Vec<SegmentScore>>, i: usize| {
        side.as_ref().map_or(0.0, |scores| scores[i].score)
    };

    let rows: Vec<StreetScoreRow> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let stats = bus_scores
                .as_ref()
                .or(rail_scores.as_ref())
                .map(|scores| &scores[i]);
            let score_bus = score_of(&bus_scores, i);
            let score_rail = score_of(&rail_scores, i);
            StreetScoreRow {
                link_id: segment.link_id.clone(),
                name: segment.name.clone(),
                points_count: stats.map_or(0, |s| s.points_count),
                stops_computecount: stats.map_or(0, |s| s.stops_computecount),
                sig_mean_mean: stats.map_or(0.0, |s| s.sig_mean_mean),
                score_bus,
                score_rail,
                score: score_bus + score_rail,
                transit_score: None,
            }
        })
        .collect();

    info!(
        rows = rows.len(),
        bus = bus.is_some(),
        rail = rail.is_some(),
        "Street scores combined"
    );
    Ok(rows)
}

/// Fills `transit_score` on every row with the presentation rescale.
pub fn apply_presentation(rows: &mut [StreetScoreRow], config: &ScoringConfig) {
    for row in rows {
        row.transit_score = Some(normalize(
            row.score,
            config.presentation_cap,
            config.presentation_range,
        ));
    }
}
