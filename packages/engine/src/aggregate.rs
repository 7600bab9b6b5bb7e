//! Cross-level aggregation of indicator values.
//!
//! Indicator features computed on a fine spatial-unit level (blocks) are
//! matched onto the features of a coarser level (districts) and their
//! values are combined per target.
//!
//! Matching walks the targets in their given order. Each target claims
//! every still-unclaimed indicator feature it contains, so an indicator
//! feature contributes to at most one target. Claims are tracked in an
//! ownership table indexed by indicator position; the indicator collection
//! itself is never modified. An R-tree over the indicator envelopes narrows
//! the candidates per target, and candidates are visited in indicator order
//! so the outcome equals a full ordered scan.
//!
//! Indicator features left unclaimed after the last target abort the run
//! with [`EngineError::AggregationIncomplete`].

use std::sync::Arc;

use chrono::NaiveDate;
use geo::{Geometry, Rect};
use spatial_indicators_geometry::{EnvelopeIndex, GeometryService};
use spatial_indicators_indicator_models::{
    AggregationMode, BBOX_CONTAINMENT_RATIO, DateKey, FeatureCollection, IndicatorValue,
    MatchStrategy, SpatialUnitFeature,
};

use crate::EngineError;
use crate::progress::{ProgressCallback, null_progress};

/// How an indicator feature is tested against a target.
enum Probe {
    /// Representative interior point.
    Point(Geometry<f64>),
    /// The feature's own geometry, compared by bounding-box overlap.
    Envelope,
}

/// Matches indicator features onto target features and combines their
/// values.
pub struct AggregationStage {
    geometry: Arc<dyn GeometryService>,
    matching: MatchStrategy,
    progress: Arc<dyn ProgressCallback>,
}

impl AggregationStage {
    /// Creates a stage using one matching predicate for all its runs.
    #[must_use]
    pub fn new(geometry: Arc<dyn GeometryService>, matching: MatchStrategy) -> Self {
        Self {
            geometry,
            matching,
            progress: null_progress(),
        }
    }

    /// Attaches a progress reporter advanced once per target feature.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The matching predicate of this stage.
    #[must_use]
    pub const fn matching(&self) -> MatchStrategy {
        self.matching
    }

    /// Aggregates `indicator` values for `date` onto `targets`.
    ///
    /// In [`AggregationMode::Sum`] a target receives the total of its
    /// matched values: 0 without matches and `NoData` when every match is
    /// `NoData`. In [`AggregationMode::Average`] it receives the mean
    /// weighted by each indicator feature's aggregation weight, or `NoData`
    /// when the weights of the usable values sum to 0. `NoData` values,
    /// missing values and non-finite values contribute nothing.
    ///
    /// Target aggregation weights are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AggregationIncomplete`] with the orphaned ids
    /// if any indicator feature matches no target.
    pub fn aggregate(
        &self,
        date: NaiveDate,
        mut targets: FeatureCollection,
        indicator: &FeatureCollection,
        mode: AggregationMode,
    ) -> Result<FeatureCollection, EngineError> {
        let key = DateKey::for_date(date);
        let sources = indicator.features();

        let mut probes = Vec::with_capacity(sources.len());
        let mut envelopes = Vec::with_capacity(sources.len());
        for (i, feature) in sources.iter().enumerate() {
            let probe = self.probe(feature);
            if let Some((probe, envelope)) = probe {
                envelopes.push((i, envelope));
                probes.push(Some(probe));
            } else {
                log::debug!(
                    "Indicator feature '{}' has no usable geometry",
                    feature.id()
                );
                probes.push(None);
            }
        }
        let index = EnvelopeIndex::build(envelopes);

        let mut claims: Vec<Option<usize>> = vec![None; sources.len()];
        let mut results = Vec::with_capacity(targets.len());

        self.progress.set_total(targets.len() as u64);
        self.progress
            .set_message(format!("Aggregating {key} ({mode}, {})", self.matching));

        for (t, target) in targets.features().iter().enumerate() {
            let mut accumulator = Accumulator::default();

            if let Some(shape) = &target.geometry
                && let Some(envelope) = self.geometry.bounding_rect(shape)
            {
                for i in index.candidates(&envelope) {
                    if claims[i].is_some() {
                        continue;
                    }
                    let Some(probe) = &probes[i] else {
                        continue;
                    };
                    if self.contains(shape, probe, &sources[i]) {
                        claims[i] = Some(t);
                        accumulator.fold(&sources[i], &key);
                    }
                }
            }

            results.push(accumulator.finish(mode));
            self.progress.inc(1);
        }

        let orphans = claims
            .iter()
            .zip(sources)
            .filter(|(claim, _)| claim.is_none())
            .map(|(_, feature)| feature.id().clone())
            .collect::<Vec<_>>();
        if !orphans.is_empty() {
            self.progress.finish(format!(
                "Aggregation failed: {} unmatched indicator features",
                orphans.len()
            ));
            log::error!(
                "{} of {} indicator features matched no target feature",
                orphans.len(),
                sources.len()
            );
            return Err(EngineError::AggregationIncomplete {
                count: orphans.len(),
                ids: orphans,
            });
        }

        for (feature, value) in targets.features_mut().zip(results) {
            feature.set_value(key.clone(), value);
        }

        self.progress.finish(format!(
            "Aggregated {} indicator features onto {} targets",
            sources.len(),
            targets.len()
        ));
        log::info!(
            "Aggregated {} indicator features onto {} targets for {key} ({mode}, {})",
            sources.len(),
            targets.len(),
            self.matching
        );
        Ok(targets)
    }

    /// The probe and the envelope used to find candidate targets.
    fn probe(&self, feature: &SpatialUnitFeature) -> Option<(Probe, Rect<f64>)> {
        let geometry = feature.geometry.as_ref()?;
        match self.matching {
            MatchStrategy::PointContainment => {
                let point = self.geometry.interior_point(geometry)?;
                Some((Probe::Point(Geometry::Point(point)), Rect::new(point.0, point.0)))
            }
            MatchStrategy::BboxOverlap => {
                let envelope = self.geometry.bounding_rect(geometry)?;
                Some((Probe::Envelope, envelope))
            }
        }
    }

    fn contains(
        &self,
        target: &Geometry<f64>,
        probe: &Probe,
        feature: &SpatialUnitFeature,
    ) -> bool {
        match probe {
            Probe::Point(point) => self.geometry.within(point, target),
            Probe::Envelope => feature.geometry.as_ref().is_some_and(|geometry| {
                self.geometry.bbox_overlap_ratio(geometry, target) >= BBOX_CONTAINMENT_RATIO
            }),
        }
    }
}

/// Running combination of one target's matched values.
#[derive(Default)]
struct Accumulator {
    matched: usize,
    usable: usize,
    total: f64,
    weighted_total: f64,
    weight_total: f64,
}

impl Accumulator {
    fn fold(&mut self, feature: &SpatialUnitFeature, key: &DateKey) {
        self.matched += 1;
        let Some(value) = feature
            .value(key)
            .and_then(IndicatorValue::as_f64)
            .filter(|v| v.is_finite())
        else {
            return;
        };
        let weight = feature.aggregation_weight();
        self.usable += 1;
        self.total += value;
        self.weighted_total += weight * value;
        self.weight_total += weight;
    }

    #[allow(clippy::float_cmp)]
    fn finish(&self, mode: AggregationMode) -> IndicatorValue {
        match mode {
            AggregationMode::Sum if self.matched == 0 => IndicatorValue::Value(0.0),
            AggregationMode::Sum if self.usable == 0 => IndicatorValue::NoData,
            AggregationMode::Sum => IndicatorValue::from(self.total),
            AggregationMode::Average if self.weight_total == 0.0 => IndicatorValue::NoData,
            AggregationMode::Average => {
                IndicatorValue::from(self.weighted_total / self.weight_total)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use spatial_indicators_geometry::PlanarGeometryService;
    use spatial_indicators_indicator_models::FeatureId;

    use super::*;
    use crate::test_support::{collection, date, key, point, square};

    fn stage(matching: MatchStrategy) -> AggregationStage {
        AggregationStage::new(Arc::new(PlanarGeometryService::new()), matching)
    }

    /// A (area 10) and B (area 5), side by side.
    fn districts() -> FeatureCollection {
        let a = Rect::new((0.0, 0.0), (5.0, 2.0)).to_polygon();
        let b = Rect::new((5.0, 0.0), (10.0, 1.0)).to_polygon();
        collection(vec![
            SpatialUnitFeature::new("A", Some(a.into())),
            SpatialUnitFeature::new("B", Some(b.into())),
        ])
    }

    fn indicator_points(values: &[(f64, f64, IndicatorValue)]) -> FeatureCollection {
        collection(
            values
                .iter()
                .enumerate()
                .map(|(i, (x, y, v))| {
                    SpatialUnitFeature::new(i.to_string(), Some(point(*x, *y)))
                        .with_value(key(2020, 1, 1), *v)
                })
                .collect(),
        )
    }

    fn value_of(collection: &FeatureCollection, id: &str) -> Option<IndicatorValue> {
        collection
            .get(&FeatureId::new(id))
            .and_then(|f| f.value(&key(2020, 1, 1)))
    }

    fn scenario_points() -> FeatureCollection {
        indicator_points(&[
            (1.0, 1.0, IndicatorValue::Value(4.0)),
            (3.0, 1.0, IndicatorValue::Value(6.0)),
            (7.0, 0.5, IndicatorValue::Value(2.0)),
        ])
    }

    #[test]
    fn sum_adds_matched_values() {
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(
                date(2020, 1, 1),
                districts(),
                &scenario_points(),
                AggregationMode::Sum,
            )
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(10.0)));
        assert_eq!(value_of(&result, "B"), Some(IndicatorValue::Value(2.0)));
    }

    #[test]
    fn average_with_unit_weights() {
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(
                date(2020, 1, 1),
                districts(),
                &scenario_points(),
                AggregationMode::Average,
            )
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(5.0)));
        assert_eq!(value_of(&result, "B"), Some(IndicatorValue::Value(2.0)));
    }

    #[test]
    fn average_uses_indicator_weights() {
        let features = vec![
            SpatialUnitFeature::new("1", Some(point(1.0, 1.0)))
                .with_value(key(2020, 1, 1), 4.0)
                .with_aggregation_weight(3.0)
                .unwrap(),
            SpatialUnitFeature::new("2", Some(point(3.0, 1.0)))
                .with_value(key(2020, 1, 1), 8.0)
                .with_aggregation_weight(1.0)
                .unwrap(),
        ];
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(
                date(2020, 1, 1),
                districts(),
                &collection(features),
                AggregationMode::Average,
            )
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(5.0)));
    }

    #[test]
    fn average_without_matches_is_no_data() {
        let indicator = indicator_points(&[(1.0, 1.0, IndicatorValue::Value(4.0))]);
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(
                date(2020, 1, 1),
                districts(),
                &indicator,
                AggregationMode::Average,
            )
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(4.0)));
        assert_eq!(value_of(&result, "B"), Some(IndicatorValue::NoData));
    }

    #[test]
    fn sum_without_matches_is_zero() {
        let indicator = indicator_points(&[(1.0, 1.0, IndicatorValue::Value(4.0))]);
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(date(2020, 1, 1), districts(), &indicator, AggregationMode::Sum)
            .unwrap();
        assert_eq!(value_of(&result, "B"), Some(IndicatorValue::Value(0.0)));
    }

    #[test]
    fn only_no_data_candidates_stay_no_data() {
        let indicator = indicator_points(&[
            (1.0, 1.0, IndicatorValue::NoData),
            (3.0, 1.0, IndicatorValue::NoData),
            (7.0, 0.5, IndicatorValue::Value(2.0)),
        ]);
        for mode in [AggregationMode::Sum, AggregationMode::Average] {
            let result = stage(MatchStrategy::PointContainment)
                .aggregate(date(2020, 1, 1), districts(), &indicator, mode)
                .unwrap();
            assert_eq!(value_of(&result, "A"), Some(IndicatorValue::NoData));
            assert_eq!(value_of(&result, "B"), Some(IndicatorValue::Value(2.0)));
        }
    }

    #[test]
    fn no_data_is_skipped_next_to_values() {
        let indicator = indicator_points(&[
            (1.0, 1.0, IndicatorValue::NoData),
            (3.0, 1.0, IndicatorValue::Value(6.0)),
            (7.0, 0.5, IndicatorValue::Value(2.0)),
        ]);
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(
                date(2020, 1, 1),
                districts(),
                &indicator,
                AggregationMode::Average,
            )
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(6.0)));
    }

    #[test]
    fn orphans_abort_the_run() {
        let indicator = indicator_points(&[
            (1.0, 1.0, IndicatorValue::Value(4.0)),
            (7.0, 0.5, IndicatorValue::Value(2.0)),
            (50.0, 50.0, IndicatorValue::Value(1.0)),
        ]);
        let result = stage(MatchStrategy::PointContainment).aggregate(
            date(2020, 1, 1),
            districts(),
            &indicator,
            AggregationMode::Sum,
        );
        match result {
            Err(EngineError::AggregationIncomplete { count, ids }) => {
                assert_eq!(count, 1);
                assert_eq!(ids, vec![FeatureId::new("2")]);
            }
            other => panic!("expected AggregationIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn every_indicator_feature_is_claimed_once() {
        let overlapping = collection(vec![
            SpatialUnitFeature::new("outer", Some(square(0.0, 0.0, 10.0))),
            SpatialUnitFeature::new("inner", Some(square(0.0, 0.0, 5.0))),
        ]);
        let indicator = indicator_points(&[
            (1.0, 1.0, IndicatorValue::Value(1.0)),
            (2.0, 2.0, IndicatorValue::Value(1.0)),
            (8.0, 8.0, IndicatorValue::Value(1.0)),
        ]);
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(date(2020, 1, 1), overlapping, &indicator, AggregationMode::Sum)
            .unwrap();
        assert_eq!(value_of(&result, "outer"), Some(IndicatorValue::Value(3.0)));
        assert_eq!(value_of(&result, "inner"), Some(IndicatorValue::Value(0.0)));
    }

    #[test]
    fn bbox_overlap_tolerates_slight_overhang() {
        let blocks = collection(vec![
            // 5% of the block's box sticks out of district A.
            SpatialUnitFeature::new("b1", Some(square(4.9, 0.0, 2.0)))
                .with_value(key(2020, 1, 1), 3.0),
            SpatialUnitFeature::new("b2", Some(square(0.0, 0.0, 2.0)))
                .with_value(key(2020, 1, 1), 1.0),
        ]);
        let districts = collection(vec![
            SpatialUnitFeature::new("A", Some(square(0.0, 0.0, 6.8))),
            SpatialUnitFeature::new("B", Some(square(6.8, 0.0, 6.8))),
        ]);

        let result = stage(MatchStrategy::BboxOverlap)
            .aggregate(date(2020, 1, 1), districts, &blocks, AggregationMode::Sum)
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(4.0)));
        assert_eq!(value_of(&result, "B"), Some(IndicatorValue::Value(0.0)));
    }

    #[test]
    fn bbox_overlap_below_threshold_is_orphaned() {
        let blocks = collection(vec![
            SpatialUnitFeature::new("straddling", Some(square(5.8, 0.0, 2.0)))
                .with_value(key(2020, 1, 1), 3.0),
        ]);
        let districts = collection(vec![
            SpatialUnitFeature::new("A", Some(square(0.0, 0.0, 6.8))),
            SpatialUnitFeature::new("B", Some(square(6.8, 0.0, 6.8))),
        ]);

        let result = stage(MatchStrategy::BboxOverlap).aggregate(
            date(2020, 1, 1),
            districts,
            &blocks,
            AggregationMode::Sum,
        );
        assert!(matches!(
            result,
            Err(EngineError::AggregationIncomplete { count: 1, .. })
        ));
    }

    #[test]
    fn concave_blocks_match_by_interior_point() {
        // An L-shaped block whose centroid lies outside the block, in
        // district B, while the block itself lies in A.
        let l_shape: Geometry<f64> = geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 0.5),
            (x: 0.5, y: 0.5),
            (x: 0.5, y: 4.0),
            (x: 0.0, y: 4.0),
        ]
        .into();
        let blocks = collection(vec![
            SpatialUnitFeature::new("L", Some(l_shape)).with_value(key(2020, 1, 1), 7.0),
        ]);
        let a: Geometry<f64> = geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 0.6),
            (x: 0.6, y: 0.6),
            (x: 0.6, y: 4.0),
            (x: 0.0, y: 4.0),
        ]
        .into();
        let districts = collection(vec![
            SpatialUnitFeature::new("B", Some(square(0.6, 0.6, 4.0))),
            SpatialUnitFeature::new("A", Some(a)),
        ]);

        let result = stage(MatchStrategy::PointContainment)
            .aggregate(date(2020, 1, 1), districts, &blocks, AggregationMode::Sum)
            .unwrap();
        assert_eq!(value_of(&result, "A"), Some(IndicatorValue::Value(7.0)));
        assert_eq!(value_of(&result, "B"), Some(IndicatorValue::Value(0.0)));
    }

    #[test]
    fn target_weights_are_untouched() {
        let targets = collection(vec![
            SpatialUnitFeature::new("A", Some(square(0.0, 0.0, 5.0)))
                .with_aggregation_weight(25.0)
                .unwrap(),
        ]);
        let indicator = indicator_points(&[(1.0, 1.0, IndicatorValue::Value(4.0))]);
        let result = stage(MatchStrategy::PointContainment)
            .aggregate(date(2020, 1, 1), targets, &indicator, AggregationMode::Sum)
            .unwrap();
        let a = result.get(&FeatureId::new("A")).unwrap();
        assert!((a.aggregation_weight() - 25.0).abs() < f64::EPSILON);
    }
}
