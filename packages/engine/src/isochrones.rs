//! Batched isochrone requests.
//!
//! Providers accept a limited number of locations per call. Locations are
//! split into consecutive batches of at most
//! [`IsochroneProvider::max_locations`] and every answer is re-attached to
//! its origin by `batch offset + group_index`.

use geo::{MultiPolygon, Point};
use spatial_indicators_geometry::{GeometryError, IsochroneProvider, IsochroneRequest};

use crate::EngineError;

/// Requests one isochrone per location, preserving input order.
///
/// Batches are awaited one after the other. Several polygons answered for
/// the same location are merged into one multipolygon.
///
/// # Errors
///
/// Returns [`EngineError::Collaborator`] if a batch fails, if an answer
/// refers to a position outside its batch, or if a location receives no
/// polygon at all.
pub async fn batched_isochrones(
    provider: &dyn IsochroneProvider,
    locations: &[Point<f64>],
    request: &IsochroneRequest,
) -> Result<Vec<MultiPolygon<f64>>, EngineError> {
    let batch_size = provider.max_locations().max(1);
    let mut polygons: Vec<MultiPolygon<f64>> = vec![MultiPolygon(vec![]); locations.len()];
    let batches = locations.len().div_ceil(batch_size);

    for (batch, chunk) in locations.chunks(batch_size).enumerate() {
        let offset = batch * batch_size;
        log::debug!(
            "Isochrone batch {}/{batches}: locations {offset}..{}",
            batch + 1,
            offset + chunk.len()
        );

        for isochrone in provider.isochrones(chunk, request).await? {
            if isochrone.group_index >= chunk.len() {
                return Err(GeometryError::MalformedResponse {
                    message: format!(
                        "isochrone group_index {} outside a batch of {} locations",
                        isochrone.group_index,
                        chunk.len()
                    ),
                }
                .into());
            }
            polygons[offset + isochrone.group_index]
                .0
                .extend(isochrone.polygon.0);
        }
    }

    if let Some(missing) = polygons.iter().position(|p| p.0.is_empty()) {
        return Err(GeometryError::MalformedResponse {
            message: format!("no isochrone returned for location {missing}"),
        }
        .into());
    }

    log::info!(
        "Received {} isochrones in {batches} batches",
        polygons.len()
    );
    Ok(polygons)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use geo::{BoundingRect, Rect, coord};
    use spatial_indicators_geometry::{Isochrone, RangeType};

    use super::*;

    /// Answers each location with a unit square at its coordinates, in
    /// reverse order, and records the batch sizes it saw.
    struct SquareProvider {
        max_locations: usize,
        batches: Mutex<Vec<usize>>,
        offset_group_index: usize,
    }

    impl SquareProvider {
        fn new(max_locations: usize) -> Self {
            Self {
                max_locations,
                batches: Mutex::new(vec![]),
                offset_group_index: 0,
            }
        }
    }

    #[async_trait]
    impl IsochroneProvider for SquareProvider {
        fn max_locations(&self) -> usize {
            self.max_locations
        }

        async fn isochrones(
            &self,
            locations: &[Point<f64>],
            _request: &IsochroneRequest,
        ) -> Result<Vec<Isochrone>, GeometryError> {
            self.batches.lock().unwrap().push(locations.len());
            Ok(locations
                .iter()
                .enumerate()
                .rev()
                .map(|(i, p)| {
                    let square = Rect::new(
                        coord! { x: p.x(), y: p.y() },
                        coord! { x: p.x() + 1.0, y: p.y() + 1.0 },
                    );
                    Isochrone {
                        group_index: i + self.offset_group_index,
                        polygon: MultiPolygon(vec![square.to_polygon()]),
                    }
                })
                .collect())
        }
    }

    fn request() -> IsochroneRequest {
        IsochroneRequest {
            profile: "foot-walking".to_string(),
            range: 500.0,
            range_type: RangeType::Distance,
        }
    }

    fn min_x(polygon: &MultiPolygon<f64>) -> f64 {
        polygon.bounding_rect().unwrap().min().x
    }

    #[tokio::test]
    async fn reattaches_answers_by_batch_offset() {
        let provider = SquareProvider::new(5);
        let locations = (0..12)
            .map(|i| Point::new(f64::from(i) * 10.0, 0.0))
            .collect::<Vec<_>>();

        let polygons = batched_isochrones(&provider, &locations, &request())
            .await
            .unwrap();

        assert_eq!(*provider.batches.lock().unwrap(), vec![5, 5, 2]);
        assert_eq!(polygons.len(), 12);
        for (i, polygon) in polygons.iter().enumerate() {
            assert!((min_x(polygon) - locations[i].x()).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn out_of_batch_index_is_malformed() {
        let mut provider = SquareProvider::new(2);
        provider.offset_group_index = 1;
        let locations = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];

        let result = batched_isochrones(&provider, &locations, &request()).await;
        assert!(matches!(
            result,
            Err(EngineError::Collaborator(GeometryError::MalformedResponse { .. }))
        ));
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let provider = SquareProvider::new(5);
        let polygons = batched_isochrones(&provider, &[], &request()).await.unwrap();
        assert!(polygons.is_empty());
        assert!(provider.batches.lock().unwrap().is_empty());
    }
}
