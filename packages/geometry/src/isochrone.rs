//! Isochrone provider abstraction.

use async_trait::async_trait;
use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::GeometryError;

/// Whether an isochrone range is a distance or a travel time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RangeType {
    /// Network distance in meters.
    #[default]
    Distance,
    /// Travel time in seconds.
    Time,
}

/// Parameters shared by every location of one isochrone request.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneRequest {
    /// Routing profile (e.g. `"foot-walking"`, `"driving-car"`).
    pub profile: String,
    /// Range value, interpreted according to `range_type`.
    pub range: f64,
    /// Distance or time.
    pub range_type: RangeType,
}

/// One reachable-area polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Isochrone {
    /// Position of the originating location within the request.
    pub group_index: usize,
    /// Reachable area.
    pub polygon: MultiPolygon<f64>,
}

/// A network service producing isochrones for a list of locations.
///
/// Providers cap the number of locations per call; callers split larger
/// inputs into batches of at most [`IsochroneProvider::max_locations`].
#[async_trait]
pub trait IsochroneProvider: Send + Sync {
    /// Maximum number of locations accepted by a single call.
    fn max_locations(&self) -> usize;

    /// Computes isochrones for `locations`.
    ///
    /// Each returned [`Isochrone::group_index`] refers to the position of
    /// its origin within `locations`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the request fails or the response is
    /// malformed.
    async fn isochrones(
        &self,
        locations: &[Point<f64>],
        request: &IsochroneRequest,
    ) -> Result<Vec<Isochrone>, GeometryError>;
}
