#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometric primitives consumed by the indicator engine.
//!
//! The engine never computes geometry itself. It calls a
//! [`GeometryService`] for areas, representative points, containment and
//! buffers, and an [`isochrone::IsochroneProvider`] for network-distance
//! polygons. [`planar::PlanarGeometryService`] implements the former on
//! top of `geo`; [`ors::OrsIsochroneClient`] implements the latter against
//! an openrouteservice-compatible HTTP endpoint.

pub mod index;
pub mod isochrone;
pub mod ors;
pub mod planar;
mod retry;

use geo::{Geometry, MultiPolygon, Point, Rect};
use thiserror::Error;

pub use index::EnvelopeIndex;
pub use isochrone::{Isochrone, IsochroneProvider, IsochroneRequest, RangeType};
pub use planar::PlanarGeometryService;

/// Errors from geometry and isochrone collaborators.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service rejected the request or answered with an error status.
    #[error("Service error: {message}")]
    Service {
        /// Description of what went wrong.
        message: String,
    },

    /// The service answered with data the engine cannot use.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Description of what went wrong.
        message: String,
    },

    /// An operation was called with unusable input.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what went wrong.
        message: String,
    },

    /// Missing or invalid collaborator configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Geometric operations the engine relies on.
///
/// Implementations are assumed correct; the engine only decides which
/// operation to call and how to combine the answers.
pub trait GeometryService: Send + Sync {
    /// Area of a geometry in squared CRS units. Zero for points and lines.
    fn area(&self, geometry: &Geometry<f64>) -> f64;

    /// A point representing the geometry: its centroid when that lies
    /// inside, otherwise a point guaranteed to lie inside. `None` for
    /// empty geometries.
    fn interior_point(&self, geometry: &Geometry<f64>) -> Option<Point<f64>>;

    /// Whether `inner` lies within `outer`.
    fn within(&self, inner: &Geometry<f64>, outer: &Geometry<f64>) -> bool;

    /// Whether the two geometries share at least one point.
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool;

    /// Axis-aligned bounding box. `None` for empty geometries.
    fn bounding_rect(&self, geometry: &Geometry<f64>) -> Option<Rect<f64>>;

    /// Area of `bbox(a) ∩ bbox(b)` divided by the area of `bbox(a)`.
    fn bbox_overlap_ratio(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> f64;

    /// Buffers every geometry by `distance`, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidInput`] for negative or non-finite
    /// distances.
    fn buffer(
        &self,
        geometries: &[Geometry<f64>],
        distance: f64,
    ) -> Result<Vec<MultiPolygon<f64>>, GeometryError>;
}
