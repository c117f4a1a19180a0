//! Observation window geometry.
//!
//! The grid builder only needs three queries from its boundary: the
//! bounding box, the total area, and whether a cell square overlaps the
//! window with non-zero area. [`Boundary`] captures those queries;
//! [`BoundaryRegion`] answers them for a `geo` multi-polygon, keeping the
//! component polygons in an R-tree so each cell only tests the parts whose
//! envelope touches it.

use geo::{Area, BooleanOps, BoundingRect, Contains, Intersects, MultiPolygon, Polygon, Rect};
use rstar::{AABB, RTree, RTreeObject};

/// Geometry queries the grid builder runs against an observation window.
pub trait Boundary: Send + Sync {
    /// Axis-aligned bounding box, or `None` for an empty geometry.
    fn bounding_rect(&self) -> Option<Rect<f64>>;

    /// Total (unsigned) area of the window.
    fn area(&self) -> f64;

    /// Whether `polygon` overlaps the window with non-zero area.
    ///
    /// Touching along an edge or at a corner is not an overlap.
    fn overlaps_with_area(&self, polygon: &Polygon<f64>) -> bool;
}

/// One polygon of the boundary stored in the R-tree.
struct BoundaryPart {
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for BoundaryPart {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// An immutable observation window backed by a [`MultiPolygon`].
pub struct BoundaryRegion {
    shape: MultiPolygon<f64>,
    parts: RTree<BoundaryPart>,
    bounds: Option<Rect<f64>>,
    area: f64,
}

impl BoundaryRegion {
    /// Indexes the polygons of `shape`. Polygons without an exterior ring
    /// are skipped.
    #[must_use]
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let parts = shape
            .iter()
            .filter_map(|polygon| {
                let rect = polygon.bounding_rect()?;
                Some(BoundaryPart {
                    envelope: rect_envelope(rect),
                    polygon: polygon.clone(),
                })
            })
            .collect();

        let bounds = shape.bounding_rect();
        let area = shape.unsigned_area();

        Self {
            shape,
            parts: RTree::bulk_load(parts),
            bounds,
            area,
        }
    }

    /// The underlying geometry.
    #[must_use]
    pub const fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// Number of polygon parts in the window.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.size()
    }
}

impl From<MultiPolygon<f64>> for BoundaryRegion {
    fn from(shape: MultiPolygon<f64>) -> Self {
        Self::new(shape)
    }
}

impl From<Polygon<f64>> for BoundaryRegion {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::new(MultiPolygon(vec![polygon]))
    }
}

/// A rectangular raster extent used directly as the window.
impl From<Rect<f64>> for BoundaryRegion {
    fn from(rect: Rect<f64>) -> Self {
        Self::from(rect.to_polygon())
    }
}

impl Boundary for BoundaryRegion {
    fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    fn area(&self) -> f64 {
        self.area
    }

    fn overlaps_with_area(&self, polygon: &Polygon<f64>) -> bool {
        let Some(rect) = polygon.bounding_rect() else {
            return false;
        };

        self.parts
            .locate_in_envelope_intersecting(&rect_envelope(rect))
            .any(|part| {
                if !part.polygon.intersects(polygon) {
                    return false;
                }
                if part.polygon.contains(polygon) {
                    return true;
                }
                part.polygon.intersection(polygon).unsigned_area() > 0.0
            })
    }
}

fn rect_envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}
