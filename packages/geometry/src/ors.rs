//! openrouteservice-compatible isochrone client.
//!
//! Sends `POST {base_url}/v2/isochrones/{profile}` with the locations as
//! `[x, y]` pairs and reads the `GeoJSON` answer, where every feature
//! carries the position of its origin in `properties.group_index`.

use async_trait::async_trait;
use geo::{Geometry, MultiPolygon, Point};
use geojson::GeoJson;

use crate::isochrone::{Isochrone, IsochroneProvider, IsochroneRequest};
use crate::{GeometryError, retry};

/// Locations per request accepted by the public openrouteservice API.
pub const DEFAULT_MAX_LOCATIONS: usize = 5;

/// HTTP client for an openrouteservice isochrone endpoint.
pub struct OrsIsochroneClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_locations: usize,
}

impl OrsIsochroneClient {
    /// Creates a client. `max_locations` is clamped to at least 1.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, max_locations: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            max_locations: max_locations.max(1),
        }
    }

    /// Creates a client from `ISOCHRONE_BASE_URL`, `ISOCHRONE_API_KEY`
    /// (optional) and `ISOCHRONE_BATCH_SIZE` (optional, default
    /// [`DEFAULT_MAX_LOCATIONS`]).
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Config`] if the base URL is missing or the
    /// batch size is not a positive integer.
    pub fn from_env() -> Result<Self, GeometryError> {
        let base_url = std::env::var("ISOCHRONE_BASE_URL").map_err(|_| GeometryError::Config {
            message: "ISOCHRONE_BASE_URL environment variable not set".to_string(),
        })?;
        let api_key = std::env::var("ISOCHRONE_API_KEY").ok();
        let max_locations = match std::env::var("ISOCHRONE_BATCH_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| GeometryError::Config {
                    message: format!("ISOCHRONE_BATCH_SIZE must be a positive integer, got '{raw}'"),
                })?,
            Err(_) => DEFAULT_MAX_LOCATIONS,
        };

        log::info!("Using isochrone service at {base_url} ({max_locations} locations per request)");
        Ok(Self::new(base_url, api_key, max_locations))
    }

    fn endpoint(&self, profile: &str) -> String {
        format!("{}/v2/isochrones/{profile}", self.base_url)
    }
}

#[async_trait]
impl IsochroneProvider for OrsIsochroneClient {
    fn max_locations(&self) -> usize {
        self.max_locations
    }

    async fn isochrones(
        &self,
        locations: &[Point<f64>],
        request: &IsochroneRequest,
    ) -> Result<Vec<Isochrone>, GeometryError> {
        if locations.len() > self.max_locations {
            return Err(GeometryError::InvalidInput {
                message: format!(
                    "{} locations exceed the limit of {} per request",
                    locations.len(),
                    self.max_locations
                ),
            });
        }

        let body = serde_json::json!({
            "locations": locations.iter().map(|p| [p.x(), p.y()]).collect::<Vec<_>>(),
            "range": [request.range],
            "range_type": request.range_type.as_ref(),
        });
        let url = self.endpoint(&request.profile);

        log::debug!(
            "Requesting {} isochrones ({} {}) from {url}",
            locations.len(),
            request.range,
            request.range_type,
        );

        let response = retry::send_json(|| {
            let builder = self.client.post(&url).json(&body);
            match &self.api_key {
                Some(key) => builder.header(reqwest::header::AUTHORIZATION, key),
                None => builder,
            }
        })
        .await?;

        parse_isochrones(response)
    }
}

/// Parses an isochrone `FeatureCollection` answer.
fn parse_isochrones(response: serde_json::Value) -> Result<Vec<Isochrone>, GeometryError> {
    let GeoJson::FeatureCollection(collection) = GeoJson::from_json_value(response)
        .map_err(|e| GeometryError::MalformedResponse {
            message: format!("isochrone answer is not GeoJSON: {e}"),
        })?
    else {
        return Err(GeometryError::MalformedResponse {
            message: "isochrone answer is not a FeatureCollection".to_string(),
        });
    };

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            let group_index = feature
                .property("group_index")
                .and_then(serde_json::Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| GeometryError::MalformedResponse {
                    message: format!("isochrone feature {i} has no group_index"),
                })?;

            let geometry = feature
                .geometry
                .ok_or_else(|| GeometryError::MalformedResponse {
                    message: format!("isochrone feature {i} has no geometry"),
                })
                .and_then(|g| {
                    Geometry::<f64>::try_from(g).map_err(|e| GeometryError::MalformedResponse {
                        message: format!("isochrone feature {i}: {e}"),
                    })
                })?;

            let polygon = match geometry {
                Geometry::Polygon(p) => MultiPolygon(vec![p]),
                Geometry::MultiPolygon(mp) => mp,
                _ => {
                    return Err(GeometryError::MalformedResponse {
                        message: format!("isochrone feature {i} is not polygonal"),
                    });
                }
            };

            Ok(Isochrone {
                group_index,
                polygon,
            })
        })
        .collect()
}
