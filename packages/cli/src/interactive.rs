//! Interactive browsing of the registered indicator processes.

use dialoguer::Select;
use spatial_indicators_engine::StrategyRegistry;
use spatial_indicators_engine::definition::{ProcessDefinition, StrategyConfig};

/// Lets the user pick an indicator and prints how it is computed and
/// aggregated.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn run(registry: &StrategyRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let strategies = registry.strategies().collect::<Vec<_>>();
    let labels = strategies
        .iter()
        .map(|s| format!("{} ({})", s.definition().name, s.id()))
        .collect::<Vec<_>>();

    let idx = Select::new()
        .with_prompt("Which indicator?")
        .items(&labels)
        .default(0)
        .interact()?;

    print_definition(strategies[idx].definition());
    Ok(())
}

/// Prints one definition in a human-readable form.
pub fn print_definition(definition: &ProcessDefinition) {
    println!("{} ({})", definition.name, definition.id);
    if let Some(description) = &definition.description {
        println!("  {description}");
    }
    println!("  strategy:    {}", definition.strategy.kind());
    match &definition.strategy {
        StrategyConfig::WeightedSubindicators { components } => {
            for component in components {
                println!(
                    "    {} weighted by parameter '{}'",
                    component.dataset, component.weight_parameter
                );
            }
        }
        StrategyConfig::TemporalChange {
            dataset,
            kind,
            years_parameter,
        } => {
            println!("    {kind} change of {dataset} over '{years_parameter}' years");
        }
        StrategyConfig::ReachabilityCoverage {
            facilities,
            population,
            weight_attribute,
            method,
            range_type,
        } => {
            println!("    {population} ({weight_attribute}) reaching {facilities}");
            println!("    {method} by {range_type}, parameters 'distance', 'travel_mode'");
        }
        StrategyConfig::OverlayAccumulation {
            points,
            value_attribute,
            year_attribute,
        } => {
            println!("    {points}: {value_attribute} active since {year_attribute}");
            println!("    decayed by parameter 'decay_rate'");
        }
    }
    println!(
        "  aggregation: {} by {}, {:?} weights",
        definition.aggregation.mode(),
        definition.aggregation.matching,
        definition.aggregation.weighting
    );
}
