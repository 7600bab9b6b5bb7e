//! Built-in indicator strategies.
//!
//! Each strategy is configured by the strategy block of a
//! [`crate::ProcessDefinition`] and resolves its process parameters before
//! touching any feature.

pub mod overlay;
pub mod reachability;
pub mod temporal;
pub mod weighted;

use spatial_indicators_indicator_models::{DateKey, FeatureCollection, FeatureId, IndicatorValue};

use crate::compute::ComputeGap;

pub use overlay::OverlayAccumulation;
pub use reachability::ReachabilityCoverage;
pub use temporal::TemporalChange;
pub use weighted::WeightedSubindicators;

/// The numeric value of feature `id` in `dataset` at `key`.
fn indicator_value(
    dataset: &FeatureCollection,
    id: &FeatureId,
    key: &DateKey,
) -> Result<f64, ComputeGap> {
    dataset
        .get(id)
        .ok_or(ComputeGap::MissingFeature)?
        .value(key)
        .and_then(IndicatorValue::as_f64)
        .ok_or(ComputeGap::MissingValue)
}
