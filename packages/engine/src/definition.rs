//! Indicator process definitions, deserialized from TOML.
//!
//! Each definition names the strategy computing the indicator, the
//! datasets and parameter names it reads, and how its values are carried
//! to coarser spatial-unit levels.

use serde::{Deserialize, Serialize};
use spatial_indicators_geometry::RangeType;
use spatial_indicators_indicator_models::{AggregationMode, MatchStrategy};
use strum_macros::{AsRefStr, Display, EnumString};

/// One indicator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Unique indicator id (e.g. `"social_status_index"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Strategy computing the values.
    pub strategy: StrategyConfig,
    /// Aggregation behavior.
    #[serde(default)]
    pub aggregation: AggregationSettings,
}

/// Strategy selection and its dataset/parameter bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Weighted combination of base indicators.
    WeightedSubindicators {
        /// Base indicators and the parameter carrying each weight.
        components: Vec<SubindicatorComponent>,
    },
    /// Change of a base indicator over a number of years.
    TemporalChange {
        /// Base indicator dataset reference.
        dataset: String,
        /// How the two values are compared.
        kind: ChangeKind,
        /// Parameter carrying the year offset.
        #[serde(default = "default_years_parameter")]
        years_parameter: String,
    },
    /// Share of a population proxy within reach of facilities.
    ReachabilityCoverage {
        /// Facility georesource reference.
        facilities: String,
        /// Population proxy georesource reference (e.g. residential
        /// buildings).
        population: String,
        /// Numeric attribute weighting each proxy feature (e.g. floor
        /// area).
        weight_attribute: String,
        /// How reachable areas are derived.
        method: ReachMethod,
        /// Whether the `distance` parameter is a distance or a time
        /// (isochrones only).
        #[serde(default)]
        range_type: RangeType,
    },
    /// Sum of time-decayed point attributes per feature.
    OverlayAccumulation {
        /// Point georesource reference.
        points: String,
        /// Attribute accumulated per point.
        value_attribute: String,
        /// Attribute holding the year a point became active.
        year_attribute: String,
    },
}

impl StrategyConfig {
    /// Short strategy name, matching the TOML `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WeightedSubindicators { .. } => "weighted_subindicators",
            Self::TemporalChange { .. } => "temporal_change",
            Self::ReachabilityCoverage { .. } => "reachability_coverage",
            Self::OverlayAccumulation { .. } => "overlay_accumulation",
        }
    }
}

fn default_years_parameter() -> String {
    "comparison_years".to_string()
}

/// One base indicator of a weighted combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubindicatorComponent {
    /// Base indicator dataset reference (id or name).
    pub dataset: String,
    /// Parameter carrying this component's weight.
    pub weight_parameter: String,
}

/// How a temporal change is expressed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    /// `current - previous`.
    Absolute,
    /// `(current - previous) / previous * 100`.
    Relative,
    /// `current / previous`.
    Ratio,
}

/// How reachable areas around facilities are derived.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReachMethod {
    /// Euclidean buffer of the facility geometry.
    Buffer,
    /// Network isochrone around the facility location.
    Isochrone,
}

/// Aggregation settings of an indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSettings {
    /// Configured mode name. Unknown names fall back to `AVERAGE`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Spatial matching predicate.
    #[serde(default)]
    pub matching: MatchStrategy,
    /// Weight attached to every computed feature.
    #[serde(default)]
    pub weighting: AggregationWeighting,
}

impl AggregationSettings {
    /// The effective aggregation mode.
    #[must_use]
    pub fn mode(&self) -> AggregationMode {
        AggregationMode::from_config(&self.mode)
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            matching: MatchStrategy::default(),
            weighting: AggregationWeighting::default(),
        }
    }
}

fn default_mode() -> String {
    AggregationMode::Average.to_string()
}

/// Aggregation weight assigned to computed features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationWeighting {
    /// Every feature weighs 1.
    #[default]
    Unit,
    /// Features weigh their geometric area.
    Area,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_definition_with_defaults() {
        let definition: ProcessDefinition = toml::de::from_str(
            r#"
            id = "population_change"
            name = "Population change"

            [strategy]
            type = "temporal_change"
            dataset = "population"
            kind = "relative"
            "#,
        )
        .unwrap();

        assert_eq!(definition.strategy.kind(), "temporal_change");
        assert_eq!(definition.aggregation.mode(), AggregationMode::Average);
        assert_eq!(
            definition.aggregation.matching,
            MatchStrategy::PointContainment
        );
        assert_eq!(
            definition.aggregation.weighting,
            AggregationWeighting::Unit
        );
        let StrategyConfig::TemporalChange {
            years_parameter, ..
        } = definition.strategy
        else {
            panic!("expected a temporal change strategy");
        };
        assert_eq!(years_parameter, "comparison_years");
    }

    #[test]
    fn unknown_mode_is_kept_and_falls_back() {
        let definition: ProcessDefinition = toml::de::from_str(
            r#"
            id = "x"
            name = "X"

            [strategy]
            type = "overlay_accumulation"
            points = "pv"
            value_attribute = "kwp"
            year_attribute = "year"

            [aggregation]
            mode = "MEDIAN"
            matching = "bbox_overlap"
            "#,
        )
        .unwrap();

        assert_eq!(definition.aggregation.mode, "MEDIAN");
        assert_eq!(definition.aggregation.mode(), AggregationMode::Average);
        assert_eq!(definition.aggregation.matching, MatchStrategy::BboxOverlap);
    }
}
