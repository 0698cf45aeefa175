#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `tribal_risk`: builds the boundary -> county crosswalk and the
//! per-entity hazard, expanded-metrics, and vulnerability profiles.
//!
//! Logging goes through [`tribal_risk_cli_utils::init_logger`] so log
//! lines and progress bars share the terminal cleanly. Set `RUST_LOG`
//! (e.g. `RUST_LOG=info`) to see build summaries.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tribal_risk_cli_utils::{IndicatifProgress, MultiProgress};
use tribal_risk_geography::columns::load_mapping;
use tribal_risk_geography::config::load_config;
use tribal_risk_geography::progress::ProgressCallback;
use tribal_risk_geography_models::CoverageReport;
use tribal_risk_geography_models::config::{BuildConfig, ColumnMapping};

#[derive(Parser)]
#[command(name = "tribal_risk", about = "Area-weighted hazard and vulnerability profiles")]
struct Cli {
    /// Build configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "tribal_risk.toml")]
    config: PathBuf,

    /// Overrides `paths.output_dir`.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Overrides `crosswalk.min_overlap` (fraction, e.g. 0.01).
    #[arg(long, global = true)]
    min_overlap: Option<f64>,

    /// Overrides `hazard.expected_checksum` (SHA-256 hex).
    #[arg(long, global = true)]
    expected_checksum: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the boundary -> county weight table from polygons
    Crosswalk,
    /// Build per-entity hazard profiles
    Hazards,
    /// Build per-entity expanded metrics
    Metrics,
    /// Build per-entity social vulnerability profiles
    Svi,
    /// Run every stage in order
    All,
    /// Print the national percentile of a composite risk score
    Percentile {
        /// Composite risk score (0-100)
        score: f64,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> CliResult<()> {
    let multi = tribal_risk_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(dir) = cli.output_dir {
        config.paths.output_dir = dir;
    }
    if let Some(min_overlap) = cli.min_overlap {
        config.crosswalk.min_overlap = min_overlap;
    }
    if let Some(checksum) = cli.expected_checksum {
        config.hazard.expected_checksum = Some(checksum);
    }
    let mapping = load_mapping(config.columns.path.as_deref())?;
    log::debug!("Using column mapping v{}", mapping.version);

    match cli.command {
        Commands::Crosswalk => {
            let progress = IndicatifProgress::entities_bar(&multi, "crosswalk");
            tribal_risk_crosswalk::run(&config, &mapping, &progress)?;
        }
        Commands::Hazards => {
            let progress = IndicatifProgress::entities_bar(&multi, "hazards");
            summarize(&tribal_risk_hazard::run(&config, &mapping, &progress)?);
        }
        Commands::Metrics => {
            let progress = IndicatifProgress::entities_bar(&multi, "metrics");
            summarize(&tribal_risk_metrics::run(&config, &mapping, &progress)?);
        }
        Commands::Svi => {
            let progress = IndicatifProgress::entities_bar(&multi, "svi");
            summarize(&tribal_risk_svi::run(&config, &mapping, &progress)?);
        }
        Commands::All => run_all(&multi, &config, &mapping)?,
        Commands::Percentile { score } => {
            let table = tribal_risk_hazard::load_hazard_table(&config.paths.hazard_table, &mapping)?;
            let engine = tribal_risk_metrics::PercentileRankEngine::new(
                table.rows.values().map(|r| r.risk_score),
            );
            println!("{:.2}", engine.percentile(score));
        }
    }

    Ok(())
}

/// Runs every stage. The crosswalk is rebuilt only when both polygon
/// layers are present; otherwise the existing weight table is used.
fn run_all(
    multi: &MultiProgress,
    config: &BuildConfig,
    mapping: &ColumnMapping,
) -> CliResult<()> {
    let stages: Arc<dyn ProgressCallback> = IndicatifProgress::stages_bar(multi, 4);

    stages.set_message("crosswalk".to_string());
    if config.paths.boundaries_geojson.exists() && config.paths.counties_geojson.exists() {
        let progress = IndicatifProgress::entities_bar(multi, "crosswalk");
        tribal_risk_crosswalk::run(config, mapping, &progress)?;
    } else {
        log::warn!(
            "Polygon layers not found; using existing weight table {}",
            config.paths.county_weights.display()
        );
    }
    stages.inc(1);

    stages.set_message("hazards".to_string());
    let progress = IndicatifProgress::entities_bar(multi, "hazards");
    summarize(&tribal_risk_hazard::run(config, mapping, &progress)?);
    stages.inc(1);

    stages.set_message("metrics".to_string());
    let progress = IndicatifProgress::entities_bar(multi, "metrics");
    summarize(&tribal_risk_metrics::run(config, mapping, &progress)?);
    stages.inc(1);

    stages.set_message("svi".to_string());
    let progress = IndicatifProgress::entities_bar(multi, "svi");
    summarize(&tribal_risk_svi::run(config, mapping, &progress)?);
    stages.inc(1);

    stages.finish(format!("outputs in {}", config.paths.output_dir.display()));
    Ok(())
}

fn summarize(report: &CoverageReport) {
    let methods = report
        .by_method
        .iter()
        .map(|(method, n)| format!("{method}={n}"))
        .collect::<Vec<_>>()
        .join(", ");
    log::info!(
        "{}: {}/{} matched ({}%) [{methods}]",
        report.builder,
        report.matched,
        report.total_entities,
        report.match_pct
    );
    for entity in report.unmatched_entities.iter().take(10) {
        log::info!("  unmatched {} ({}): {}", entity.entity_id, entity.name, entity.reason);
    }
}
