//! [`GeometryService`] on top of the `geo` crate.
//!
//! Assumes a projected, metric CRS: areas are planar and buffer distances
//! are in CRS units.

use geo::{
    Area, BoundingRect, Buffer, Centroid, Contains, Geometry, InteriorPoint, Intersects,
    MultiPolygon, Point, Rect, Relate,
};

use crate::{GeometryError, GeometryService};

/// Planar geometry operations backed by `geo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometryService;

impl PlanarGeometryService {
    /// Creates the service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl GeometryService for PlanarGeometryService {
    fn area(&self, geometry: &Geometry<f64>) -> f64 {
        geometry.unsigned_area()
    }

    fn interior_point(&self, geometry: &Geometry<f64>) -> Option<Point<f64>> {
        match geometry.centroid() {
            Some(centroid) if geometry.contains(&centroid) => Some(centroid),
            // Concave shapes (L-shaped blocks, rings) can have their
            // centroid outside.
            _ => geometry.interior_point(),
        }
    }

    fn within(&self, inner: &Geometry<f64>, outer: &Geometry<f64>) -> bool {
        match inner {
            Geometry::Point(point) => outer.contains(point),
            _ => outer.relate(inner).is_contains(),
        }
    }

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        a.intersects(b)
    }

    fn bounding_rect(&self, geometry: &Geometry<f64>) -> Option<Rect<f64>> {
        geometry.bounding_rect()
    }

    fn bbox_overlap_ratio(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> f64 {
        let (Some(a), Some(b)) = (a.bounding_rect(), b.bounding_rect()) else {
            return 0.0;
        };
        rect_overlap_ratio(&a, &b)
    }

    fn buffer(
        &self,
        geometries: &[Geometry<f64>],
        distance: f64,
    ) -> Result<Vec<MultiPolygon<f64>>, GeometryError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(GeometryError::InvalidInput {
                message: format!("buffer distance must be a non-negative number, got {distance}"),
            });
        }
        Ok(geometries.iter().map(|g| g.buffer(distance)).collect())
    }
}

/// Share of `a`'s area covered by `b`.
///
/// A degenerate `a` (zero width or height, e.g. the box of a point) has no
/// area to share, so it counts as fully covered when it lies inside `b` and
/// uncovered otherwise.
fn rect_overlap_ratio(a: &Rect<f64>, b: &Rect<f64>) -> f64 {
    let a_area = a.width() * a.height();
    if a_area <= 0.0 {
        let inside = a.min().x >= b.min().x
            && a.min().y >= b.min().y
            && a.max().x <= b.max().x
            && a.max().y <= b.max().y;
        return if inside { 1.0 } else { 0.0 };
    }

    let width = a.max().x.min(b.max().x) - a.min().x.max(b.min().x);
    let height = a.max().y.min(b.max().y) - a.min().y.max(b.min().y);
    if width <= 0.0 || height <= 0.0 {
        return 0.0;
    }
    width * height / a_area
}
