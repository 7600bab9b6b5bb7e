//! Change of a base indicator over a number of years.

use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use spatial_indicators_indicator_models::{DateKey, FeatureCollection};

use crate::EngineError;
use crate::compute::{ComputeGap, ComputeRequest, ComputeServices, IndicatorStrategy, annotate};
use crate::definition::{ChangeKind, ProcessDefinition};
use crate::strategies::indicator_value;

/// Compares each feature's value at the target date with its value a
/// number of years earlier.
pub struct TemporalChange {
    definition: ProcessDefinition,
    dataset: String,
    kind: ChangeKind,
    years_parameter: String,
}

impl TemporalChange {
    #[must_use]
    pub const fn new(
        definition: ProcessDefinition,
        dataset: String,
        kind: ChangeKind,
        years_parameter: String,
    ) -> Self {
        Self {
            definition,
            dataset,
            kind,
            years_parameter,
        }
    }
}

/// The date `years` before `date`, keeping month and day where possible
/// (29 February falls back to 28 February).
fn years_before(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(years.checked_mul(12)?))
}

#[allow(clippy::float_cmp)]
fn change(kind: ChangeKind, current: f64, previous: f64) -> Result<f64, ComputeGap> {
    match kind {
        ChangeKind::Absolute => Ok(current - previous),
        ChangeKind::Relative | ChangeKind::Ratio if previous == 0.0 => {
            Err(ComputeGap::ZeroDenominator)
        }
        ChangeKind::Relative => Ok((current - previous) / previous * 100.0),
        ChangeKind::Ratio => Ok(current / previous),
    }
}

#[async_trait]
impl IndicatorStrategy for TemporalChange {
    fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    async fn compute(
        &self,
        request: ComputeRequest<'_>,
        services: &ComputeServices,
    ) -> Result<FeatureCollection, EngineError> {
        let years = request.params().require_u32(&self.years_parameter)?;
        let previous_date =
            years_before(request.date, years).ok_or_else(|| EngineError::ParameterInvalid {
                name: self.years_parameter.clone(),
                message: format!("{years} years before {} is out of range", request.date),
            })?;
        let dataset = &request.base_indicator(&self.dataset)?.features;

        let key = request.date_key();
        let previous_key = DateKey::for_date(previous_date);
        log::debug!(
            "{}: {} change between {previous_key} and {key}",
            self.definition.id,
            self.kind
        );

        let results = request
            .targets
            .features()
            .iter()
            .map(|target| {
                let current = indicator_value(dataset, target.id(), &key)?;
                let previous = indicator_value(dataset, target.id(), &previous_key)?;
                change(self.kind, current, previous)
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
