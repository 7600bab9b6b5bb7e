//! The indicator computation contract shared by every strategy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use spatial_indicators_geometry::{GeometryService, IsochroneProvider, PlanarGeometryService};
use spatial_indicators_indicator_models::{
    Dataset, DatasetCatalog, DateKey, FeatureCollection, IndicatorValue, ProcessParameter,
};
use strum_macros::{AsRefStr, Display};

use crate::aggregate::AggregationStage;
use crate::definition::{AggregationWeighting, ProcessDefinition};
use crate::params::ProcessParameters;
use crate::progress::{ProgressCallback, null_progress};
use crate::{EngineError, disaggregate};

/// Collaborators a run may call.
#[derive(Clone)]
pub struct ComputeServices {
    /// Geometric primitives.
    pub geometry: Arc<dyn GeometryService>,
    /// Network isochrones. Only reachability coverage with the
    /// `isochrone` method needs one.
    pub isochrones: Option<Arc<dyn IsochroneProvider>>,
    /// Progress reporting for aggregation passes.
    pub progress: Arc<dyn ProgressCallback>,
}

impl ComputeServices {
    /// Planar geometry, no isochrone provider, no progress output.
    #[must_use]
    pub fn planar() -> Self {
        Self {
            geometry: Arc::new(PlanarGeometryService::new()),
            isochrones: None,
            progress: null_progress(),
        }
    }

    /// Attaches an isochrone provider.
    #[must_use]
    pub fn with_isochrones(mut self, provider: Arc<dyn IsochroneProvider>) -> Self {
        self.isochrones = Some(provider);
        self
    }

    /// Attaches a progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }
}

/// Inputs of one compute run.
///
/// The targets are owned and returned annotated; everything else is
/// borrowed so concurrent runs over other dates can share it.
pub struct ComputeRequest<'a> {
    /// Target date.
    pub date: NaiveDate,
    /// Spatial-unit features receiving the values.
    pub targets: FeatureCollection,
    /// Previously computed indicators, by id or name.
    pub base_indicators: &'a DatasetCatalog,
    /// Reference geography, by id or name.
    pub georesources: &'a DatasetCatalog,
    /// Caller-supplied process parameters.
    pub parameters: &'a [ProcessParameter],
}

impl<'a> ComputeRequest<'a> {
    /// The property key of the target date.
    #[must_use]
    pub fn date_key(&self) -> DateKey {
        DateKey::for_date(self.date)
    }

    /// Typed access to the process parameters.
    #[must_use]
    pub const fn params(&self) -> ProcessParameters<'a> {
        ProcessParameters::new(self.parameters)
    }

    /// Resolves a base indicator by id or name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DatasetMissing`] if nothing matches.
    pub fn base_indicator(&self, reference: &str) -> Result<&'a Dataset, EngineError> {
        resolve_dataset(self.base_indicators, reference)
    }

    /// Resolves a georesource by id or name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DatasetMissing`] if nothing matches.
    pub fn georesource(&self, reference: &str) -> Result<&'a Dataset, EngineError> {
        resolve_dataset(self.georesources, reference)
    }
}

fn resolve_dataset<'a>(
    catalog: &'a DatasetCatalog,
    reference: &str,
) -> Result<&'a Dataset, EngineError> {
    catalog
        .resolve(reference)
        .ok_or_else(|| EngineError::DatasetMissing {
            reference: reference.to_string(),
        })
}

/// Why a single feature's value could not be derived.
///
/// Gaps are local: the feature receives `NoData` and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ComputeGap {
    /// An input dataset has no feature with the target's id.
    MissingFeature,
    /// The input feature exists but has no value for the needed date, or
    /// the value is `NoData`.
    MissingValue,
    /// A ratio's denominator is zero.
    ZeroDenominator,
    /// No population proxy lies within the target feature.
    NoPopulationProxy,
    /// The computed value is infinite or NaN.
    NonFinite,
}

/// One indicator's computation strategy.
///
/// Strategies are looked up by indicator id in the
/// [`crate::StrategyRegistry`]. Only `compute` differs between them;
/// aggregation follows the process definition and disaggregation is not
/// supported.
#[async_trait]
pub trait IndicatorStrategy: Send + Sync {
    /// The process definition this strategy was built from.
    fn definition(&self) -> &ProcessDefinition;

    /// The indicator id.
    fn id(&self) -> &str {
        &self.definition().id
    }

    /// Derives one value per target feature for `request.date`.
    ///
    /// Every returned feature carries the date's value (or `NoData`) and
    /// an aggregation weight; the id set is unchanged.
    ///
    /// # Errors
    ///
    /// Fails the whole run on missing or invalid parameters, unresolved
    /// datasets and collaborator failures.
    async fn compute(
        &self,
        request: ComputeRequest<'_>,
        services: &ComputeServices,
    ) -> Result<FeatureCollection, EngineError>;

    /// Aggregates the indicator onto coarser `targets` with the mode and
    /// matching of the process definition.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AggregationIncomplete`] if indicator
    /// features match no target.
    fn aggregate(
        &self,
        date: NaiveDate,
        targets: FeatureCollection,
        indicator: &FeatureCollection,
        services: &ComputeServices,
    ) -> Result<FeatureCollection, EngineError> {
        let settings = &self.definition().aggregation;
        AggregationStage::new(services.geometry.clone(), settings.matching)
            .with_progress(services.progress.clone())
            .aggregate(date, targets, indicator, settings.mode())
    }

    /// Distributes a coarse indicator onto finer targets.
    ///
    /// # Errors
    ///
    /// Always returns [`EngineError::NotSupported`].
    fn disaggregate(
        &self,
        date: NaiveDate,
        targets: FeatureCollection,
        indicator: &FeatureCollection,
    ) -> Result<FeatureCollection, EngineError> {
        disaggregate::disaggregate(date, targets, indicator)
    }
}

/// Writes per-target results onto the targets.
///
/// `results` is aligned with the target order. Gaps and non-finite values
/// become `NoData`; the aggregation weight follows the definition's
/// weighting policy.
pub(crate) fn annotate(
    definition: &ProcessDefinition,
    mut targets: FeatureCollection,
    key: &DateKey,
    results: Vec<Result<f64, ComputeGap>>,
    geometry: &dyn GeometryService,
) -> Result<FeatureCollection, EngineError> {
    let weighting = definition.aggregation.weighting;
    let mut gaps = 0_usize;

    for (feature, result) in targets.features_mut().zip(results) {
        let value = match result.and_then(finite) {
            Ok(v) => IndicatorValue::Value(v),
            Err(gap) => {
                log::debug!(
                    "{} {key}: feature '{}' has no value ({gap})",
                    definition.id,
                    feature.id()
                );
                gaps += 1;
                IndicatorValue::NoData
            }
        };
        feature.set_value(key.clone(), value);

        let weight = match weighting {
            AggregationWeighting::Unit => 1.0,
            AggregationWeighting::Area => feature
                .geometry
                .as_ref()
                .map_or(0.0, |g| geometry.area(g)),
        };
        feature.set_aggregation_weight(weight)?;
    }

    log::info!(
        "Computed {} for {key}: {} features, {gaps} without value",
        definition.id,
        targets.len()
    );
    Ok(targets)
}

fn finite(value: f64) -> Result<f64, ComputeGap> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputeGap::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use geo::{Geometry, polygon};
    use spatial_indicators_indicator_models::{FeatureId, SpatialUnitFeature};

    use super::*;
    use crate::test_support;

    #[test]
    fn annotates_values_gaps_and_area_weights() {
        let definition = test_support::definition(
            "photovoltaic_capacity",
            r#"
            [strategy]
            type = "overlay_accumulation"
            points = "pv"
            value_attribute = "kwp"
            year_attribute = "year"

            [aggregation]
            weighting = "area"
            "#,
        );
        let square: Geometry<f64> =
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)].into();
        let targets = FeatureCollection::new(vec![
            SpatialUnitFeature::new("a", Some(square)),
            SpatialUnitFeature::new("b", None),
            SpatialUnitFeature::new("c", None),
        ])
        .unwrap();
        let key = DateKey::for_date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());

        let annotated = annotate(
            &definition,
            targets,
            &key,
            vec![
                Ok(3.5),
                Err(ComputeGap::ZeroDenominator),
                Ok(f64::INFINITY),
            ],
            &PlanarGeometryService::new(),
        )
        .unwrap();

        let a = annotated.get(&FeatureId::new("a")).unwrap();
        assert_eq!(a.value(&key), Some(IndicatorValue::Value(3.5)));
        assert!((a.aggregation_weight() - 4.0).abs() < 1e-9);
        let b = annotated.get(&FeatureId::new("b")).unwrap();
        assert_eq!(b.value(&key), Some(IndicatorValue::NoData));
        assert!(b.aggregation_weight().abs() < f64::EPSILON);
        let c = annotated.get(&FeatureId::new("c")).unwrap();
        assert_eq!(c.value(&key), Some(IndicatorValue::NoData));
    }

    #[test]
    fn unresolved_datasets_are_reported() {
        let catalog = DatasetCatalog::new();
        let request = ComputeRequest {
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            targets: FeatureCollection::default(),
            base_indicators: &catalog,
            georesources: &catalog,
            parameters: &[],
        };
        assert!(matches!(
            request.base_indicator("population"),
            Err(EngineError::DatasetMissing { reference }) if reference == "population"
        ));
        assert_eq!(request.date_key().as_str(), "DATE_2020-01-01");
    }

    #[test]
    fn gap_names() {
        assert_eq!(ComputeGap::NoPopulationProxy.to_string(), "no_population_proxy");
        assert_eq!(ComputeGap::MissingValue.as_ref(), "missing_value");
    }
}
