//! Distribution of coarse indicator values onto finer spatial units.
//!
//! Only the contract exists. No distribution rule is defined, so every
//! call fails with [`EngineError::NotSupported`].

use chrono::NaiveDate;
use spatial_indicators_indicator_models::FeatureCollection;

use crate::EngineError;

/// Distributes `indicator` values for `date` onto the finer `targets`.
///
/// # Errors
///
/// Always returns [`EngineError::NotSupported`].
pub fn disaggregate(
    date: NaiveDate,
    targets: FeatureCollection,
    indicator: &FeatureCollection,
) -> Result<FeatureCollection, EngineError> {
    log::warn!(
        "Disaggregation of {} features onto {} targets for {date} requested",
        indicator.len(),
        targets.len()
    );
    Err(EngineError::NotSupported {
        operation: "disaggregation".to_string(),
    })
}
