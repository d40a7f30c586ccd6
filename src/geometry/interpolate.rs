use geo::{Euclidean, Length, LineInterpolatePoint, LineString, Point};

use crate::model::{RoadSegment, SamplePoint};

/// Planar length of a line string.
pub fn line_length(line: &LineString) -> f64 {
    Euclidean.length(line)
}

/// Drops repeated consecutive vertices so every segment has a length.
fn without_repeats(line: &LineString) -> LineString {
    let mut coords = line.0.clone();
    coords.dedup();
    LineString::new(coords)
}

/// Point at `distance` along a line of total `length`, clamped to its ends.
fn point_at_distance(line: &LineString, length: f64, distance: f64) -> Option<Point> {
    if length == 0.0 {
        return line.0.first().map(|c| Point::from(*c));
    }
    line.line_interpolate_point((distance / length).clamp(0.0, 1.0))
}

/// Point halfway along `line`.
pub fn midpoint(line: &LineString) -> Option<Point> {
    let line = without_repeats(line);
    let length = line_length(&line);
    point_at_distance(&line, length, length / 2.0)
}

/// Samples `line` every `spacing` units starting at distance 0, then
/// appends the final vertex unless a sample already sits exactly on it.
///
/// A segment of length 25 with spacing 10 yields points at 0, 10, 20 and 25.
pub fn interpolate_points(line: &LineString, spacing: f64) -> Vec<Point> {
    let Some(last) = line.0.last().map(|c| Point::from(*c)) else {
        return Vec::new();
    };

    let line = without_repeats(line);
    let length = line_length(&line);
    let mut points = Vec::new();
    let mut step = 0usize;
    loop {
        let distance = step as f64 * spacing;
        if distance >= length {
            break;
        }
        if let Some(point) = point_at_distance(&line, length, distance) {
            points.push(point);
        }
        step += 1;
    }

    if !points.contains(&last) {
        points.push(last);
    }
    points
}

/// Expands every road segment into its sample points, tagged with the
/// segment's `link_id` and name.
pub fn sample_segments(segments: &[RoadSegment], spacing: f64) -> Vec<SamplePoint> {
    segments
        .iter()
        .flat_map(|segment| {
            interpolate_points(&segment.geometry, spacing)
                .into_iter()
                .map(|point| SamplePoint {
                    link_id: segment.link_id.clone(),
                    name: segment.name.clone(),
                    point,
                })
        })
        .collect()
}
