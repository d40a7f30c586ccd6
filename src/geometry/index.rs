//! R-tree indexes backing the nearest-node lookup and the spatial joins.

use geo::{BoundingRect, Coord, Polygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, PointDistance, RTree};

/// Points tagged with a payload, e.g. a graph node index or a stop position.
pub struct PointIndex<T> {
    tree: RTree<GeomWithData<[f64; 2], T>>,
}

impl<T> PointIndex<T> {
    pub fn new(items: impl IntoIterator<Item = (Coord, T)>) -> Self {
        let items = items
            .into_iter()
            .map(|(c, data)| GeomWithData::new([c.x, c.y], data))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn nearest(&self, at: Coord) -> Option<&T> {
        self.tree.nearest_neighbor(&[at.x, at.y]).map(|item| &item.data)
    }

    /// Payloads at distance `<= radius` from `at` (a closed disc).
    pub fn within(&self, at: Coord, radius: f64) -> impl Iterator<Item = &T> {
        self.tree
            .locate_within_distance([at.x, at.y], radius * radius)
            .map(|item| &item.data)
    }

    /// Payloads at distance `< radius` from `at` (an open disc).
    pub fn strictly_within(&self, at: Coord, radius: f64) -> impl Iterator<Item = &T> {
        let query = [at.x, at.y];
        let radius_2 = radius * radius;
        self.tree
            .locate_within_distance(query, radius_2)
            .filter(move |item| item.distance_2(&query) < radius_2)
            .map(|item| &item.data)
    }
}

/// Bounding boxes of a polygon slice, keyed by position in that slice.
/// Candidates still need an exact predicate check.
pub struct PolygonIndex {
    tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl PolygonIndex {
    /// Polygons without a bounding box (no exterior coordinates) are left out.
    pub fn new<'a>(polygons: impl IntoIterator<Item = &'a Polygon>) -> Self {
        let items = polygons
            .into_iter()
            .enumerate()
            .filter_map(|(i, polygon)| {
                let rect = polygon.bounding_rect()?;
                let min = rect.min();
                let max = rect.max();
                Some(GeomWithData::new(
                    Rectangle::from_corners([min.x, min.y], [max.x, max.y]),
                    i,
                ))
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Positions of polygons whose bounding box covers `at`, boundary included.
    pub fn candidates(&self, at: Coord) -> impl Iterator<Item = usize> + '_ {
        let envelope = AABB::from_point([at.x, at.y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.data)
    }
}
