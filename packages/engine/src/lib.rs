#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial indicator computation and cross-level aggregation.
//!
//! A run takes a target date and a spatial-unit [`FeatureCollection`] and
//! produces one value per feature through an [`IndicatorStrategy`]:
//!
//! * [`strategies::weighted::WeightedSubindicators`] combines base
//!   indicators with caller-supplied weights
//! * [`strategies::temporal::TemporalChange`] compares a base indicator
//!   with its value some years earlier
//! * [`strategies::reachability::ReachabilityCoverage`] measures which
//!   share of a population proxy lies within reach of facilities
//! * [`strategies::overlay::OverlayAccumulation`] sums decayed point
//!   attributes per feature
//!
//! Indicators computed on a fine level are carried to a coarser level by
//! the [`aggregate::AggregationStage`]. Strategies are defined as TOML
//! files embedded by the [`registry`].

pub mod aggregate;
mod assign;
pub mod compute;
pub mod definition;
pub mod disaggregate;
pub mod isochrones;
pub mod params;
pub mod progress;
pub mod registry;
pub mod strategies;
#[cfg(test)]
mod test_support;

use spatial_indicators_geometry::GeometryError;
use spatial_indicators_indicator_models::{FeatureId, ModelError};
use thiserror::Error;

pub use aggregate::AggregationStage;
pub use compute::{ComputeGap, ComputeRequest, ComputeServices, IndicatorStrategy};
pub use definition::ProcessDefinition;
pub use registry::StrategyRegistry;

/// Errors that abort a computation or aggregation run.
///
/// A value that cannot be derived for a single feature is not an error:
/// it becomes `NoData` for that feature (see [`ComputeGap`]).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required process parameter was not supplied.
    #[error("Required process parameter '{name}' is missing")]
    ParameterMissing {
        /// Parameter name.
        name: String,
    },

    /// A process parameter was supplied with an unusable value.
    #[error("Process parameter '{name}' is invalid: {message}")]
    ParameterInvalid {
        /// Parameter name.
        name: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Indicator features were left unmatched after a full aggregation
    /// pass.
    #[error(
        "Aggregation incomplete: {count} indicator features matched no target feature ({})",
        format_ids(.ids)
    )]
    AggregationIncomplete {
        /// Number of unmatched indicator features.
        count: usize,
        /// Ids of the unmatched indicator features.
        ids: Vec<FeatureId>,
    },

    /// The geometry or isochrone service failed or answered with
    /// malformed data.
    #[error("Geometry collaborator failed: {0}")]
    Collaborator(#[from] GeometryError),

    /// A dataset reference resolved to neither an id nor a name.
    #[error("Dataset '{reference}' not found")]
    DatasetMissing {
        /// The unresolved reference.
        reference: String,
    },

    /// No strategy is registered for an indicator id.
    #[error("Unknown indicator '{id}'")]
    UnknownIndicator {
        /// The requested indicator id.
        id: String,
    },

    /// The operation exists in the contract but is not implemented.
    #[error("{operation} is not supported")]
    NotSupported {
        /// The operation that was requested.
        operation: String,
    },

    /// Output features violate a model invariant.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Lists at most ten ids, then how many more there are.
fn format_ids(ids: &[FeatureId]) -> String {
    const SHOWN: usize = 10;
    let shown = ids
        .iter()
        .take(SHOWN)
        .map(FeatureId::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > SHOWN {
        format!("{shown}, and {} more", ids.len() - SHOWN)
    } else {
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_incomplete_names_orphans() {
        let err = EngineError::AggregationIncomplete {
            count: 2,
            ids: vec![FeatureId::new("12"), FeatureId::new("19")],
        };
        assert_eq!(
            err.to_string(),
            "Aggregation incomplete: 2 indicator features matched no target feature (12, 19)"
        );
    }

    #[test]
    fn long_orphan_lists_are_truncated() {
        let ids = (0..13).map(|i| FeatureId::new(i.to_string())).collect::<Vec<_>>();
        assert_eq!(
            format_ids(&ids),
            "0, 1, 2, 3, 4, 5, 6, 7, 8, 9, and 3 more"
        );
    }
}
