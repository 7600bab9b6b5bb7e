//! Aggregation mode and spatial matching configuration.

use std::str::FromStr as _;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Minimum share of an indicator feature's bounding box that must overlap
/// a target's bounding box for [`MatchStrategy::BboxOverlap`] to count it
/// as contained.
pub const BBOX_CONTAINMENT_RATIO: f64 = 0.90;

/// How matched indicator values are combined into a target value.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AggregationMode {
    /// Running total of matched values.
    Sum,
    /// Weighted mean of matched values.
    Average,
}

impl AggregationMode {
    /// Parses a configured mode name, falling back to
    /// [`AggregationMode::Average`] for anything unrecognized.
    #[must_use]
    pub fn from_config(raw: &str) -> Self {
        Self::from_str(raw.trim()).unwrap_or_else(|_| {
            log::warn!("Unrecognized aggregation mode '{raw}', falling back to AVERAGE");
            Self::Average
        })
    }
}

/// Predicate deciding whether an indicator feature lies in a target
/// feature. One strategy is used for a whole aggregation run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchStrategy {
    /// Share of the indicator's bounding box overlapping the target's
    /// bounding box is at least [`BBOX_CONTAINMENT_RATIO`].
    BboxOverlap,
    /// The indicator's representative interior point lies within the
    /// target geometry.
    #[default]
    PointContainment,
}
