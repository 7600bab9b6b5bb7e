#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for spatial indicator computation and aggregation.
//!
//! Reads spatial-unit features, base indicators and georesources from
//! `GeoJSON` files, runs one indicator strategy for one or more dates, and
//! writes the annotated features back as `GeoJSON`. Without a subcommand
//! the registered indicators can be browsed interactively.
//!
//! Uses `indicatif-log-bridge` (via
//! [`spatial_indicators_cli_utils::init_logger`]) to route `log` output
//! through `indicatif::MultiProgress` so that log lines and progress bars
//! never fight for the terminal.

mod inputs;
mod interactive;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use spatial_indicators_cli_utils::IndicatifProgress;
use spatial_indicators_engine::definition::{ReachMethod, StrategyConfig};
use spatial_indicators_engine::{
    AggregationStage, ComputeRequest, ComputeServices, IndicatorStrategy, StrategyRegistry,
    disaggregate,
};
use spatial_indicators_geometry::ors::OrsIsochroneClient;
use spatial_indicators_indicator_models::{AggregationMode, FeatureCollection, MatchStrategy};

use crate::inputs::{DatasetArg, load_catalog};

#[derive(Parser)]
#[command(
    name = "spatial_indicators",
    about = "Spatial indicator computation and aggregation"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all registered indicator processes
    List,
    /// Compute an indicator for one or more dates
    Compute {
        /// Indicator id (e.g., "`population_change`")
        #[arg(long)]
        indicator: String,
        /// Target dates (YYYY-MM-DD). Several dates are computed concurrently.
        #[arg(long = "date", required = true)]
        dates: Vec<NaiveDate>,
        /// `GeoJSON` file with the spatial-unit features to annotate
        #[arg(long)]
        targets: PathBuf,
        /// Base indicator dataset as `<id>[:<name>]=<path>` (repeatable)
        #[arg(long = "base-indicator")]
        base_indicators: Vec<DatasetArg>,
        /// Georesource dataset as `<id>[:<name>]=<path>` (repeatable)
        #[arg(long = "georesource")]
        georesources: Vec<DatasetArg>,
        /// JSON file with process parameters (`[{"name": ..., "value": ...}]`)
        #[arg(long)]
        params: Option<PathBuf>,
        /// Output `GeoJSON` file
        #[arg(long)]
        output: PathBuf,
    },
    /// Aggregate indicator features onto a coarser spatial-unit level
    Aggregate {
        /// Date whose values are aggregated (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// `GeoJSON` file with the coarser target features
        #[arg(long)]
        targets: PathBuf,
        /// `GeoJSON` file with the computed indicator features
        #[arg(long)]
        indicator_features: PathBuf,
        /// Use the mode and matching configured for this indicator
        #[arg(long, conflicts_with_all = ["mode", "matching"])]
        indicator: Option<String>,
        /// Aggregation mode (`SUM` or `AVERAGE`; anything else falls back
        /// to `AVERAGE`)
        #[arg(long, default_value = "AVERAGE")]
        mode: String,
        /// Matching predicate (`point_containment` or `bbox_overlap`)
        #[arg(long, default_value = "point_containment", value_parser = parse_matching)]
        matching: MatchStrategy,
        /// Output `GeoJSON` file
        #[arg(long)]
        output: PathBuf,
    },
    /// Distribute indicator values onto a finer spatial-unit level
    Disaggregate {
        /// Date whose values are distributed (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// `GeoJSON` file with the finer target features
        #[arg(long)]
        targets: PathBuf,
        /// `GeoJSON` file with the coarse indicator features
        #[arg(long)]
        indicator_features: PathBuf,
        /// Indicator id
        #[arg(long)]
        indicator: Option<String>,
        /// Output `GeoJSON` file
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = spatial_indicators_cli_utils::init_logger();
    let cli = Cli::parse();
    let registry = StrategyRegistry::builtin();

    let Some(command) = cli.command else {
        return interactive::run(&registry);
    };

    let start = Instant::now();

    match command {
        Commands::List => {
            for strategy in registry.strategies() {
                interactive::print_definition(strategy.definition());
                println!();
            }
        }
        Commands::Compute {
            indicator,
            dates,
            targets,
            base_indicators,
            georesources,
            params,
            output,
        } => {
            let strategy = registry.get(&indicator)?;
            let targets = spatial_indicators_io::read_collection(&targets)?;
            let base_indicators = load_catalog(&base_indicators)?;
            let georesources = load_catalog(&georesources)?;
            let parameters = params
                .as_deref()
                .map(spatial_indicators_io::read_parameters)
                .transpose()?
                .unwrap_or_default();
            let services = services_for(strategy.as_ref())?;

            let steps = IndicatifProgress::dates_bar(&multi, &indicator, dates.len());
            let runs = dates.iter().map(|&date| {
                let strategy = strategy.clone();
                let steps = steps.clone();
                let request = ComputeRequest {
                    date,
                    targets: targets.clone(),
                    base_indicators: &base_indicators,
                    georesources: &georesources,
                    parameters: &parameters,
                };
                let services = &services;
                async move {
                    let result = strategy.compute(request, services).await;
                    steps.inc(1);
                    result
                }
            });
            let results = futures::future::try_join_all(runs).await?;
            steps.finish(format!("Computed {indicator} for {} dates", dates.len()));

            let merged = merge_dates(results).ok_or("no dates to compute")?;
            write_output(&output, &merged)?;
        }
        Commands::Aggregate {
            date,
            targets,
            indicator_features,
            indicator,
            mode,
            matching,
            output,
        } => {
            let targets = spatial_indicators_io::read_collection(&targets)?;
            let fine = spatial_indicators_io::read_collection(&indicator_features)?;
            let bar = IndicatifProgress::matching_bar(&multi, "Matching indicator features");

            let aggregated = if let Some(indicator) = indicator {
                let strategy = registry.get(&indicator)?;
                let services = ComputeServices::planar().with_progress(bar);
                strategy.aggregate(date, targets, &fine, &services)?
            } else {
                let services = ComputeServices::planar();
                AggregationStage::new(services.geometry, matching)
                    .with_progress(bar)
                    .aggregate(date, targets, &fine, AggregationMode::from_config(&mode))?
            };
            write_output(&output, &aggregated)?;
        }
        Commands::Disaggregate {
            date,
            targets,
            indicator_features,
            indicator,
            output,
        } => {
            let targets = spatial_indicators_io::read_collection(&targets)?;
            let coarse = spatial_indicators_io::read_collection(&indicator_features)?;
            let result = match indicator {
                Some(indicator) => registry
                    .get(&indicator)?
                    .disaggregate(date, targets, &coarse)?,
                None => disaggregate::disaggregate(date, targets, &coarse)?,
            };
            write_output(&output, &result)?;
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Collaborators for a strategy: planar geometry always, an isochrone
/// client from the environment when the strategy needs one.
fn services_for(
    strategy: &dyn IndicatorStrategy,
) -> Result<ComputeServices, Box<dyn std::error::Error>> {
    let services = ComputeServices::planar();
    let needs_isochrones = matches!(
        strategy.definition().strategy,
        StrategyConfig::ReachabilityCoverage {
            method: ReachMethod::Isochrone,
            ..
        }
    );
    if needs_isochrones {
        Ok(services.with_isochrones(Arc::new(OrsIsochroneClient::from_env()?)))
    } else {
        Ok(services)
    }
}

fn parse_matching(raw: &str) -> Result<MatchStrategy, String> {
    raw.parse::<MatchStrategy>()
        .map_err(|_| format!("expected point_containment or bbox_overlap, got '{raw}'"))
}

/// Folds the per-date results into one collection carrying every date's
/// value column.
fn merge_dates(results: Vec<FeatureCollection>) -> Option<FeatureCollection> {
    let mut results = results.into_iter();
    let mut merged = results.next()?;
    for result in results {
        merged.merge_values(&result);
    }
    Some(merged)
}

fn write_output(
    path: &Path,
    features: &FeatureCollection,
) -> Result<(), Box<dyn std::error::Error>> {
    spatial_indicators_io::write_collection(path, features)?;
    log::info!("Wrote {} features to {}", features.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use spatial_indicators_indicator_models::{DateKey, FeatureId, SpatialUnitFeature};

    use super::*;

    fn run(date: NaiveDate, value: f64) -> FeatureCollection {
        FeatureCollection::new(vec![
            SpatialUnitFeature::new("a", None).with_value(DateKey::for_date(date), value),
        ])
        .unwrap()
    }

    #[test]
    fn merges_value_columns_of_all_dates() {
        let first = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let second = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

        let merged = merge_dates(vec![run(first, 1.0), run(second, 2.0)]).unwrap();
        let a = merged.get(&FeatureId::new("a")).unwrap();
        assert_eq!(a.values.len(), 2);
        assert!(merge_dates(vec![]).is_none());
    }

    #[test]
    fn parses_matching_names() {
        assert_eq!(
            parse_matching("bbox_overlap").unwrap(),
            MatchStrategy::BboxOverlap
        );
        assert!(parse_matching("centroid").is_err());
    }
}
