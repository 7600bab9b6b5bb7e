//! Compile-time registry of indicator process definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a new indicator requires creating a TOML file in `processes/`
//! and adding a corresponding entry here.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::EngineError;
use crate::compute::IndicatorStrategy;
use crate::definition::{ProcessDefinition, StrategyConfig};
use crate::strategies::{
    OverlayAccumulation, ReachabilityCoverage, TemporalChange, WeightedSubindicators,
};

/// Number of registered indicator processes. Updated when new processes
/// are added. Enforced by a test.
#[cfg(test)]
const EXPECTED_PROCESS_COUNT: usize = 6;

/// Embedded TOML process definitions.
const PROCESS_TOMLS: &[(&str, &str)] = &[
    (
        "social_status_index",
        include_str!("../processes/social_status_index.toml"),
    ),
    (
        "population_change",
        include_str!("../processes/population_change.toml"),
    ),
    (
        "population_difference",
        include_str!("../processes/population_difference.toml"),
    ),
    (
        "supermarket_walkability",
        include_str!("../processes/supermarket_walkability.toml"),
    ),
    (
        "playground_coverage",
        include_str!("../processes/playground_coverage.toml"),
    ),
    (
        "photovoltaic_capacity",
        include_str!("../processes/photovoltaic_capacity.toml"),
    ),
];

/// Returns all registered process definitions.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught during CI.
#[must_use]
pub fn all_definitions() -> Vec<ProcessDefinition> {
    PROCESS_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse indicator process '{name}': {e}"))
        })
        .collect()
}

/// Builds the strategy a definition describes.
#[must_use]
pub fn strategy_for(definition: ProcessDefinition) -> Arc<dyn IndicatorStrategy> {
    match definition.strategy.clone() {
        StrategyConfig::WeightedSubindicators { components } => {
            Arc::new(WeightedSubindicators::new(definition, components))
        }
        StrategyConfig::TemporalChange {
            dataset,
            kind,
            years_parameter,
        } => Arc::new(TemporalChange::new(
            definition,
            dataset,
            kind,
            years_parameter,
        )),
        StrategyConfig::ReachabilityCoverage {
            facilities,
            population,
            weight_attribute,
            method,
            range_type,
        } => Arc::new(ReachabilityCoverage::new(
            definition,
            facilities,
            population,
            weight_attribute,
            method,
            range_type,
        )),
        StrategyConfig::OverlayAccumulation {
            points,
            value_attribute,
            year_attribute,
        } => Arc::new(OverlayAccumulation::new(
            definition,
            points,
            value_attribute,
            year_attribute,
        )),
    }
}

/// Strategies by indicator id.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn IndicatorStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every embedded process definition.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for definition in all_definitions() {
            registry.register(strategy_for(definition));
        }
        registry
    }

    /// Registers a strategy under its id, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn IndicatorStrategy>) {
        let id = strategy.id().to_string();
        if self.strategies.insert(id.clone(), strategy).is_some() {
            log::warn!("Replaced strategy for indicator '{id}'");
        }
    }

    /// Looks a strategy up by indicator id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownIndicator`] if none is registered.
    pub fn get(&self, id: &str) -> Result<Arc<dyn IndicatorStrategy>, EngineError> {
        self.strategies
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownIndicator { id: id.to_string() })
    }

    /// Registered indicator ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Registered strategies, sorted by id.
    pub fn strategies(&self) -> impl Iterator<Item = &Arc<dyn IndicatorStrategy>> {
        self.strategies.values()
    }
}
