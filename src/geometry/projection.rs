//! Equirectangular projection around a local origin.
//!
//! Good to well under a percent across a city, which is all the walking and
//! buffer radii need. Distances in the projected frame are metres.

use geo::{Coord, LineString, MapCoords, Point, Polygon};

/// Metres per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin: Coord,
    cos_lat: f64,
}

impl LocalProjection {
    /// `origin` is a lon/lat coordinate.
    pub fn new(origin: Coord) -> Self {
        Self {
            origin,
            cos_lat: origin.y.to_radians().cos(),
        }
    }

    pub fn origin(&self) -> Coord {
        self.origin
    }

    pub fn project(&self, lon_lat: Coord) -> Coord {
        Coord {
            x: (lon_lat.x - self.origin.x) * METERS_PER_DEGREE * self.cos_lat,
            y: (lon_lat.y - self.origin.y) * METERS_PER_DEGREE,
        }
    }

    pub fn unproject(&self, xy: Coord) -> Coord {
        Coord {
            x: self.origin.x + xy.x / (METERS_PER_DEGREE * self.cos_lat),
            y: self.origin.y + xy.y / METERS_PER_DEGREE,
        }
    }

    pub fn project_point(&self, lon_lat: Point) -> Point {
        Point::from(self.project(lon_lat.0))
    }

    pub fn project_line(&self, line: &LineString) -> LineString {
        line.map_coords(|c| self.project(c))
    }

    pub fn unproject_line(&self, line: &LineString) -> LineString {
        line.map_coords(|c| self.unproject(c))
    }

    pub fn unproject_polygon(&self, polygon: &Polygon) -> Polygon {
        polygon.map_coords(|c| self.unproject(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_origin_projects_to_zero() {
        let projection = LocalProjection::new(Coord { x: -71.06, y: 42.36 });
        let xy = projection.project(projection.origin());
        assert_relative_eq!(xy.x, 0.0);
        assert_relative_eq!(xy.y, 0.0);
    }

    #[test]
    fn test_one_degree_north_is_one_degree_of_metres() {
        let projection = LocalProjection::new(Coord { x: 10.0, y: 0.0 });
        let xy = projection.project(Coord { x: 10.0, y: 1.0 });
        assert_relative_eq!(xy.y, METERS_PER_DEGREE);
    }

    #[test]
    fn test_longitude_shrinks_with_latitude() {
        let projection = LocalProjection::new(Coord { x: 0.0, y: 60.0 });
        let xy = projection.project(Coord { x: 1.0, y: 60.0 });
        assert_relative_eq!(xy.x, METERS_PER_DEGREE * 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let projection = LocalProjection::new(Coord { x: 126.97, y: 37.56 });
        let original = Coord { x: 127.01, y: 37.52 };
        let back = projection.unproject(projection.project(original));
        assert_relative_eq!(back.x, original.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, original.y, epsilon = 1e-9);
    }
}
