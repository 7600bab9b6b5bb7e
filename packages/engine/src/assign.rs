//! Assignment of points to the target features containing them.

use geo::{Geometry, Point, Rect};
use spatial_indicators_geometry::{EnvelopeIndex, GeometryService};
use spatial_indicators_indicator_models::FeatureCollection;

/// Claims every point for the first target (in target order) whose
/// geometry contains it.
///
/// Returns one entry per point: the claiming target's position, or `None`
/// for points outside every target and for `None` points. A point is
/// claimed at most once.
pub fn claim_points(
    targets: &FeatureCollection,
    points: &[Option<Point<f64>>],
    geometry: &dyn GeometryService,
) -> Vec<Option<usize>> {
    let index = EnvelopeIndex::build(
        points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i, Rect::new(p.0, p.0)))),
    );
    let mut claims = vec![None; points.len()];

    for (t, target) in targets.features().iter().enumerate() {
        let Some(shape) = &target.geometry else {
            continue;
        };
        let Some(envelope) = geometry.bounding_rect(shape) else {
            continue;
        };
        for i in index.candidates(&envelope) {
            if claims[i].is_some() {
                continue;
            }
            let Some(point) = points[i] else {
                continue;
            };
            if geometry.within(&Geometry::Point(point), shape) {
                claims[i] = Some(t);
            }
        }
    }

    claims
}

#[cfg(test)]
mod tests {
    use spatial_indicators_geometry::PlanarGeometryService;
    use spatial_indicators_indicator_models::SpatialUnitFeature;

    use super::*;
    use crate::test_support::{collection, square};

    #[test]
    fn first_target_in_order_wins() {
        let targets = collection(vec![
            SpatialUnitFeature::new("big", Some(square(0.0, 0.0, 10.0))),
            SpatialUnitFeature::new("small", Some(square(0.0, 0.0, 2.0))),
            SpatialUnitFeature::new("empty", None),
        ]);
        let points = vec![
            Some(Point::new(1.0, 1.0)),
            Some(Point::new(5.0, 5.0)),
            Some(Point::new(50.0, 50.0)),
            None,
        ];

        let claims = claim_points(&targets, &points, &PlanarGeometryService::new());
        assert_eq!(claims, vec![Some(0), Some(0), None, None]);
    }

    #[test]
    fn points_split_across_disjoint_targets() {
        let targets = collection(vec![
            SpatialUnitFeature::new("a", Some(square(0.0, 0.0, 2.0))),
            SpatialUnitFeature::new("b", Some(square(2.0, 0.0, 2.0))),
        ]);
        let points = vec![Some(Point::new(3.0, 1.0)), Some(Point::new(1.0, 1.0))];

        let claims = claim_points(&targets, &points, &PlanarGeometryService::new());
        assert_eq!(claims, vec![Some(1), Some(0)]);
    }
}
