//! Time-decayed accumulation of point attributes.
//!
//! Used for capacities that degrade over time, such as installed
//! photovoltaic power: every point active at the target year contributes
//! `value · (1 − decay_rate)^(age in years)` to the target containing it.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use spatial_indicators_indicator_models::{FeatureCollection, SpatialUnitFeature};

use crate::EngineError;
use crate::assign::claim_points;
use crate::compute::{ComputeRequest, ComputeServices, IndicatorStrategy, annotate};
use crate::definition::ProcessDefinition;

/// Sums decayed point values per target feature.
pub struct OverlayAccumulation {
    definition: ProcessDefinition,
    points: String,
    value_attribute: String,
    year_attribute: String,
}

impl OverlayAccumulation {
    #[must_use]
    pub const fn new(
        definition: ProcessDefinition,
        points: String,
        value_attribute: String,
        year_attribute: String,
    ) -> Self {
        Self {
            definition,
            points,
            value_attribute,
            year_attribute,
        }
    }

    /// Value and activation year of a point, if both are readable.
    fn contribution(&self, feature: &SpatialUnitFeature) -> Option<(f64, i32)> {
        let value = feature.attribute_f64(&self.value_attribute)?;
        let year = activation_year(feature.attributes.get(&self.year_attribute)?)?;
        Some((value, year))
    }
}

/// Reads a year from a number (`2014`), a year string (`"2014"`) or an ISO
/// date string (`"2014-06-30"`).
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn activation_year(raw: &serde_json::Value) -> Option<i32> {
    match raw {
        serde_json::Value::Number(n) => n
            .as_f64()
            .filter(|y| y.fract() == 0.0 && y.abs() < f64::from(i32::MAX))
            .map(|y| y as i32),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i32>().ok().or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.year())
            })
        }
        _ => None,
    }
}

#[async_trait]
impl IndicatorStrategy for OverlayAccumulation {
    fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    async fn compute(
        &self,
        request: ComputeRequest<'_>,
        services: &ComputeServices,
    ) -> Result<FeatureCollection, EngineError> {
        let decay_rate = request.params().require_f64("decay_rate")?;
        if !(0.0..1.0).contains(&decay_rate) {
            return Err(EngineError::ParameterInvalid {
                name: "decay_rate".to_string(),
                message: format!("must be in [0, 1), got {decay_rate}"),
            });
        }
        let points = &request.georesource(&self.points)?.features;
        let geometry = services.geometry.as_ref();
        let target_year = request.date.year();

        let eligible = points
            .features()
            .iter()
            .map(|feature| {
                let (value, year) = self.contribution(feature)?;
                if year > target_year {
                    return None;
                }
                let point = geometry.interior_point(feature.geometry.as_ref()?)?;
                Some((point, value, target_year - year))
            })
            .collect::<Vec<_>>();
        let locations = eligible
            .iter()
            .map(|e| e.map(|(point, _, _)| point))
            .collect::<Vec<_>>();
        let claims = claim_points(&request.targets, &locations, geometry);

        let mut sums = vec![0.0_f64; request.targets.len()];
        let mut accumulated = 0_usize;
        for (entry, claim) in eligible.iter().zip(&claims) {
            let (Some((_, value, age)), Some(t)) = (entry, claim) else {
                continue;
            };
            sums[*t] += value * (1.0 - decay_rate).powi(*age);
            accumulated += 1;
        }
        log::info!(
            "{}: {accumulated} of {} points accumulated for {target_year}",
            self.definition.id,
            points.len()
        );

        let key = request.date_key();
        annotate(
            &self.definition,
            request.targets,
            &key,
            sums.into_iter().map(Ok).collect(),
            geometry,
        )
    }
}
