//! Weighted combination of base indicators.

use async_trait::async_trait;
use spatial_indicators_indicator_models::FeatureCollection;

use crate::EngineError;
use crate::compute::{ComputeRequest, ComputeServices, IndicatorStrategy, annotate};
use crate::definition::{ProcessDefinition, SubindicatorComponent};
use crate::strategies::indicator_value;

/// Weight sums further than this from 1 are reported.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// `Σ wᵢ·vᵢ` over the components, matched by feature id.
///
/// A target lacking any component value receives `NoData`.
pub struct WeightedSubindicators {
    definition: ProcessDefinition,
    components: Vec<SubindicatorComponent>,
}

impl WeightedSubindicators {
    #[must_use]
    pub const fn new(
        definition: ProcessDefinition,
        components: Vec<SubindicatorComponent>,
    ) -> Self {
        Self {
            definition,
            components,
        }
    }
}

#[async_trait]
impl IndicatorStrategy for WeightedSubindicators {
    fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    async fn compute(
        &self,
        request: ComputeRequest<'_>,
        services: &ComputeServices,
    ) -> Result<FeatureCollection, EngineError> {
        let params = request.params();
        let weights = self
            .components
            .iter()
            .map(|c| params.require_f64(&c.weight_parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let datasets = self
            .components
            .iter()
            .map(|c| request.base_indicator(&c.dataset))
            .collect::<Result<Vec<_>, _>>()?;

        let weight_sum: f64 = weights.iter().sum();
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            log::warn!(
                "{}: component weights sum to {weight_sum}, expected 1",
                self.definition.id
            );
        }

        let key = request.date_key();
        let results = request
            .targets
            .features()
            .iter()
            .map(|target| {
                weights
                    .iter()
                    .zip(&datasets)
                    .map(|(weight, dataset)| {
                        indicator_value(&dataset.features, target.id(), &key).map(|v| weight * v)
                    })
                    .sum::<Result<f64, _>>()
            })
            .collect();

        annotate(
            &self.definition,
            request.targets,
            &key,
            results,
            services.geometry.as_ref(),
        )
    }
}
