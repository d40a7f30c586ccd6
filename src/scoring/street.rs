//! Street scorer: projects stop significance onto road segments.
//!
//! Every sample point is matched against every significance area it
//! intersects. Per point the matched significance is averaged; per segment
//! the point means are averaged and damped by the log of reachable-stop
//! density:
//!
//! `Score = sig_mean_mean * ln(stops_computecount / points_count + 1)`

use geo::{Coord, CoordsIter, Intersects};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::ScoringError;
use crate::geometry::PolygonIndex;
use crate::model::{RoadSegment, SamplePoint, SegmentScore, SignificanceArea};
use crate::stats::{mean, ratio};

/// Significance gathered by one sample point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointCoverage {
    pub sig_sum: f64,
    pub stops_count: usize,
}

impl PointCoverage {
    pub fn sig_mean(&self) -> f64 {
        ratio(self.sig_sum, self.stops_count as f64)
    }
}

fn is_finite(c: Coord) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

fn check_areas(areas: &[SignificanceArea]) -> Result<(), ScoringError> {
    for area in areas {
        let context = || format!("isochrone of stop {}", area.stop_id);
        if area.polygon.exterior().0.is_empty() {
            return Err(ScoringError::spatial_join(
                context(),
                "polygon has no exterior coordinates",
            ));
        }
        // Bounding rects skip NaN vertices, so every coordinate is checked.
        if !area.polygon.coords_iter().all(is_finite) {
            return Err(ScoringError::spatial_join(
                context(),
                "polygon has non-finite coordinates",
            ));
        }
    }
    Ok(())
}

/// Left spatial join of sample points against significance areas using an
/// intersects predicate (boundary included). Areas without a significance
/// value match but contribute to neither sum nor count.
pub fn match_points(
    points: &[SamplePoint],
    areas: &[SignificanceArea],
) -> Result<Vec<PointCoverage>, ScoringError> {
    check_areas(areas)?;
    let index = PolygonIndex::new(areas.iter().map(|a| &a.polygon));

    points
        .iter()
        .map(|sample| {
            if !is_finite(sample.point.0) {
                return Err(ScoringError::spatial_join(
                    format!("sample point on link {}", sample.link_id),
                    "point has non-finite coordinates",
                ));
            }
            let mut coverage = PointCoverage::default();
            for i in index.candidates(sample.point.0) {
                let area = &areas[i];
                if !area.polygon.intersects(&sample.point) {
                    continue;
                }
                if let Some(significance) = area.significance {
                    coverage.sig_sum += significance;
                    coverage.stops_count += 1;
                }
            }
            Ok(coverage)
        })
        .collect()
}

/// `sig_mean_mean * ln(stops_computecount / points_count + 1)`, zero for a
/// segment without sample points.
pub fn segment_score(sig_mean_mean: f64, stops_computecount: usize, points_count: usize) -> f64 {
    if points_count == 0 {
        return 0.0;
    }
    sig_mean_mean * (stops_computecount as f64 / points_count as f64 + 1.0).ln()
}

/// Collapses per-point coverage into one row per road segment, in segment
/// order.
pub fn aggregate_segments(
    segments: &[RoadSegment],
    points: &[SamplePoint],
    coverage: &[PointCoverage],
) -> Vec<SegmentScore> {
    let mut per_link: HashMap<&str, (Vec<f64>, usize)> = HashMap::new();
    for (sample, cov) in points.iter().zip(coverage) {
        let entry = per_link.entry(sample.link_id.as_str()).or_default();
        entry.0.push(cov.sig_mean());
        entry.1 += cov.stops_count;
    }

    segments
        .iter()
        .map(|segment| {
            let (means, stops_computecount) = per_link
                .get(segment.link_id.as_str())
                .map(|(means, count)| (means.as_slice(), *count))
                .unwrap_or((&[], 0));
            let points_count = means.len();
            let sig_mean_mean = mean(means);
            SegmentScore {
                link_id: segment.link_id.clone(),
                name: segment.name.clone(),
                points_count,
                stops_computecount,
                sig_mean_mean,
                score: segment_score(sig_mean_mean, stops_computecount, points_count),
            }
        })
        .collect()
}

/// Scores every road segment against one set of significance areas.
pub fn score_streets(
    points: &[SamplePoint],
    areas: &[SignificanceArea],
    segments: &[RoadSegment],
) -> Result<Vec<SegmentScore>, ScoringError> {
    let coverage = match_points(points, areas)?;

    let covered = coverage.iter().filter(|c| c.stops_count > 0).count();
    if covered == 0 {
        warn!(
            points = points.len(),
            areas = areas.len(),
            "No stops contribute to any sample point"
        );
    }
    debug!(points = points.len(), covered, "Sample points matched");

    Ok(aggregate_segments(segments, points, &coverage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{LineString, Point, Polygon, polygon};

    #[test]
    fn test_single_point_single_area() {
        let points = vec![sample("L", 0.0, 0.0)];
        let areas = vec![area("s", -10.0, 10.0, Some(5.0))];
        let segments = vec![segment("L", &[(0.0, 0.0)])];

        let coverage = match_points(&points, &areas).unwrap();
        assert_eq!(coverage[0].sig_mean(), 5.0);

        let scores = score_streets(&points, &areas, &segments).unwrap();
        assert_eq!(scores[0].points_count, 1);
        assert_eq!(scores[0].stops_computecount, 1);
        assert_relative_eq!(scores[0].score, 5.0 * 2f64.ln());
        assert_relative_eq!(scores[0].score, 3.4657, epsilon = 1e-4);
    }

    #[test]
    fn test_unmatched_points_are_kept() {
        let points = vec![sample("L", 0.0, 0.0), sample("L", 100.0, 0.0)];
        let areas = vec![area("s", -10.0, 10.0, Some(4.0))];
        let segments = vec![segment("L", &[(0.0, 0.0), (100.0, 0.0)])];

        let scores = score_streets(&points, &areas, &segments).unwrap();
        let row = &scores[0];
        assert_eq!(row.points_count, 2);
        assert_eq!(row.stops_computecount, 1);
        assert_relative_eq!(row.sig_mean_mean, 2.0);
        assert_relative_eq!(row.score, 2.0 * 1.5f64.ln());
    }

    #[test]
    fn test_shared_areas_are_counted_per_point() {
        let points = vec![sample("L", 0.0, 0.0), sample("L", 1.0, 0.0)];
        let areas = vec![area("a", -10.0, 10.0, Some(2.0)), area("b", -10.0, 10.0, Some(4.0))];
        let segments = vec![segment("L", &[(0.0, 0.0), (1.0, 0.0)])];

        let row = &score_streets(&points, &areas, &segments).unwrap()[0];
        assert_eq!(row.stops_computecount, 4);
        assert_relative_eq!(row.sig_mean_mean, 3.0);
        assert_relative_eq!(row.score, 3.0 * 3f64.ln());
    }

    #[test]
    fn test_boundary_point_intersects() {
        let points = vec![sample("L", 10.0, 0.0)];
        let areas = vec![area("s", -10.0, 10.0, Some(1.0))];
        let coverage = match_points(&points, &areas).unwrap();
        assert_eq!(coverage[0].stops_count, 1);
    }

    #[test]
    fn test_area_without_significance_is_not_counted() {
        let points = vec![sample("L", 0.0, 0.0)];
        let areas = vec![area("s", -10.0, 10.0, None)];
        let coverage = match_points(&points, &areas).unwrap();
        assert_eq!(coverage[0], PointCoverage::default());
    }

    #[test]
    fn test_zero_points_and_zero_stops_score_zero() {
        assert_eq!(segment_score(7.0, 0, 0), 0.0);
        assert_eq!(segment_score(7.0, 0, 3), 0.0);

        let segments = vec![segment("empty", &[])];
        let scores = aggregate_segments(&segments, &[], &[]);
        assert_eq!(scores[0].points_count, 0);
        assert_eq!(scores[0].score, 0.0);
    }

    #[test]
    fn test_non_finite_area_is_a_join_failure() {
        // The point lies inside what remains of the polygon once the NaN
        // vertex is ignored.
        let points = vec![sample("L", 0.5, 0.9)];
        let bad = SignificanceArea {
            stop_id: "bad".into(),
            polygon: polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 1.0), (x: 1.0, y: 1.0)],
            significance: Some(1.0),
        };
        let err = match_points(&points, &[bad]).unwrap_err();
        assert!(matches!(err, ScoringError::SpatialJoin { .. }));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_non_finite_hole_is_a_join_failure() {
        let mut bad = area("holed", 0.0, 10.0, Some(2.0));
        bad.polygon.interiors_push(vec![(2.0, 2.0), (f64::INFINITY, 2.0), (2.0, 4.0)]);
        let err = match_points(&[sample("L", 5.0, 5.0)], &[bad]).unwrap_err();
        assert!(matches!(err, ScoringError::SpatialJoin { .. }));
    }

    #[test]
    fn test_empty_area_is_a_join_failure() {
        let empty = SignificanceArea {
            stop_id: "empty".into(),
            polygon: Polygon::new(LineString::new(vec![]), vec![]),
            significance: Some(1.0),
        };
        let err = match_points(&[sample("L", 0.0, 0.0)], &[empty]).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    fn sample(link_id: &str, x: f64, y: f64) -> SamplePoint {
        SamplePoint {
            link_id: link_id.into(),
            name: None,
            point: Point::new(x, y),
        }
    }

    fn segment(link_id: &str, coords: &[(f64, f64)]) -> RoadSegment {
        RoadSegment {
            link_id: link_id.into(),
            name: None,
            geometry: LineString::from(coords.to_vec()),
        }
    }

    /// Axis-aligned square from `min` to `max` on both axes.
    fn area(stop_id: &str, min: f64, max: f64, significance: Option<f64>) -> SignificanceArea {
        SignificanceArea {
            stop_id: stop_id.into(),
            polygon: polygon![(x: min, y: min), (x: max, y: min), (x: max, y: max), (x: min, y: max)],
            significance,
        }
    }
}
