#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `spatial_indicators` binary.
//!
//! Two kinds of progress are rendered:
//!
//! * [`IndicatifProgress::matching_bar`] follows one aggregation pass. The
//!   engine announces the number of target features once matching starts
//!   and ticks once per target, so the bar begins as a spinner.
//! * [`IndicatifProgress::dates_bar`] follows a compute command running
//!   several target dates concurrently, one tick per finished date.
//!
//! Final messages carry the elapsed wall time. [`init_logger`] routes the
//! engine's `log` output through the same [`MultiProgress`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use spatial_indicators_engine::progress::ProgressCallback;

pub use indicatif::MultiProgress;

const MATCHING_SPINNER: &str = "{spinner:.cyan} {msg}";
const MATCHING_BAR: &str = "  {msg} {wide_bar:.cyan/dim} {pos}/{len} targets [{eta}]";
const DATES_BAR: &str = "{msg} {wide_bar:.green/dim} {pos}/{len} dates [{elapsed_precise}]";

/// Engine progress rendered on an `indicatif` [`ProgressBar`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied once the engine reports how many targets it matches.
    counted_style: ProgressStyle,
    started: Instant,
}

impl IndicatifProgress {
    /// Progress of matching indicator features onto target features.
    #[must_use]
    pub fn matching_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(style(MATCHING_SPINNER, ProgressStyle::default_spinner()));
        bar.set_message(message.to_string());

        Arc::new(Self::new(bar, style(MATCHING_BAR, ProgressStyle::default_bar())))
    }

    /// Progress of a compute command over `dates` target dates.
    #[must_use]
    pub fn dates_bar(
        multi: &MultiProgress,
        indicator: &str,
        dates: usize,
    ) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(dates as u64));
        let counted_style = style(DATES_BAR, ProgressStyle::default_bar());
        bar.set_style(counted_style.clone());
        bar.set_message(format!("Computing {indicator}"));

        Arc::new(Self::new(bar, counted_style))
    }

    fn new(bar: ProgressBar, counted_style: ProgressStyle) -> Self {
        Self {
            bar,
            counted_style,
            started: Instant::now(),
        }
    }
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or(fallback)
        .progress_chars("##-")
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.counted_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.bar.finish_with_message(format!("{msg} in {elapsed:.1}s"));
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// Run summaries are logged at `info`, so that is the level when `RUST_LOG`
/// is unset. Returns the [`MultiProgress`] every bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed (tests).
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden(counted: &str) -> IndicatifProgress {
        IndicatifProgress::new(
            ProgressBar::hidden(),
            style(counted, ProgressStyle::default_bar()),
        )
    }

    #[test]
    fn matching_total_resets_position() {
        let progress = hidden(MATCHING_BAR);
        progress.inc(3);
        progress.set_total(10);
        progress.inc(4);

        assert_eq!(progress.bar.length(), Some(10));
        assert_eq!(progress.bar.position(), 4);
    }

    #[test]
    fn finish_reports_elapsed_time() {
        let progress = hidden(DATES_BAR);
        progress.finish("Computed population_change for 2 dates".to_string());

        assert!(progress.bar.is_finished());
        let message = progress.bar.message();
        assert!(message.starts_with("Computed population_change for 2 dates in "));
        assert!(message.ends_with('s'));
    }

    #[test]
    fn templates_are_valid() {
        for template in [MATCHING_SPINNER, MATCHING_BAR, DATES_BAR] {
            assert!(ProgressStyle::with_template(template).is_ok(), "{template}");
        }
    }
}
