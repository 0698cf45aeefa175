#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Expanded per-entity hazard metrics.
//!
//! Adds to the hazard profile a loss breakdown by consequence type, the
//! community resilience score, and a national percentile for the
//! composite risk score. Every artifact records the SHA-256 of the
//! source table it was computed from.

pub mod checksum;
pub mod percentile;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tribal_risk_geography::GeoError;
use tribal_risk_geography::atomic::{entity_artifact_path, write_json};
use tribal_risk_geography::context::GeoContext;
use tribal_risk_geography::coverage::CoverageTracker;
use tribal_risk_geography::progress::ProgressCallback;
use tribal_risk_geography::vintage::reconcile;
use tribal_risk_geography::weighting::{CountyResolution, round_to};
use tribal_risk_geography_models::config::{BuildConfig, ColumnMapping};
use tribal_risk_geography_models::{CoverageReport, GeographicEntity, MatchMethod};
use tribal_risk_hazard::{
    CountyHazardRecord, HazardAggregationEngine, HazardTable, WildfireTable, load_hazard_table,
};
use tribal_risk_hazard_models::TopCategory;

pub use checksum::file_sha256;
pub use percentile::PercentileRankEngine;

/// Subdirectory of the output directory holding expanded metrics.
pub const OUTPUT_SUBDIR: &str = "metrics";

/// Hazard table fields the expanded metrics are computed from.
pub const REQUIRED_FIELDS: &[&str] = &[
    "county_code",
    "risk_score",
    "loss_total",
    "loss_structures",
    "loss_population",
    "loss_agriculture",
    "loss_population_equivalence",
    "resilience",
    "social_vulnerability",
];

/// Errors that can occur while building expanded metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Loading inputs or writing artifacts failed.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Reading the source table for its checksum failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-entity expanded metrics artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedMetrics {
    pub entity_id: String,
    pub entity_name: String,
    /// Area-weighted composite risk score (0-100).
    pub risk_score: f64,
    /// National percentile of `risk_score` among source counties.
    pub risk_percentile: f64,
    /// Area-weighted expected annual loss in dollars.
    pub loss_total: f64,
    pub loss_by_structures: f64,
    pub loss_by_population: f64,
    pub loss_by_agriculture: f64,
    pub loss_by_population_equivalence: f64,
    pub community_resilience: f64,
    /// Area-weighted source social vulnerability score, unranked.
    pub social_vulnerability_raw: f64,
    /// Categories with a non-zero score.
    pub category_count: usize,
    pub top_categories: Vec<TopCategory>,
    pub counties_analyzed: usize,
    pub match_method: MatchMethod,
    /// Matched share of the linked county weight, in `[0, 1]`.
    pub coverage_pct: f64,
    pub dataset_version: String,
    /// Lowercase hex SHA-256 of the source table.
    pub dataset_checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub generated_at: String,
}

/// Builds [`ExpandedMetrics`] on top of the hazard aggregation.
#[derive(Debug)]
pub struct ExpandedMetricsBuilder<'a> {
    hazard: HazardAggregationEngine<'a>,
    table: &'a HazardTable,
    percentiles: &'a PercentileRankEngine,
    checksum: String,
}

impl<'a> ExpandedMetricsBuilder<'a> {
    /// Creates a builder. `wildfire` is normally empty: expanded metrics
    /// report the source table's own category scores.
    #[must_use]
    pub fn new(
        context: &'a GeoContext,
        table: &'a HazardTable,
        wildfire: &'a WildfireTable,
        percentiles: &'a PercentileRankEngine,
        dataset_version: &str,
        checksum: &str,
    ) -> Self {
        Self {
            hazard: HazardAggregationEngine::new(context, table, wildfire, dataset_version),
            table,
            percentiles,
            checksum: checksum.to_string(),
        }
    }

    /// Builds the metrics for one entity, together with the county
    /// resolution they were computed from.
    #[must_use]
    pub fn metrics(&self, entity: &GeographicEntity) -> (ExpandedMetrics, CountyResolution) {
        let (profile, resolution) = self.hazard.profile(entity);
        let loss = |f: fn(&CountyHazardRecord) -> f64| {
            round_to(
                resolution.weighted_mean(|code| self.table.get(code).map_or(0.0, f)),
                2,
            )
        };

        let metrics = ExpandedMetrics {
            entity_id: profile.entity_id,
            entity_name: profile.entity_name,
            risk_score: profile.composite.score,
            risk_percentile: round_to(self.percentiles.percentile(profile.composite.score), 2),
            loss_total: profile.composite.loss_total,
            loss_by_structures: loss(|r| r.loss_structures),
            loss_by_population: loss(|r| r.loss_population),
            loss_by_agriculture: loss(|r| r.loss_agriculture),
            loss_by_population_equivalence: loss(|r| r.loss_population_equivalence),
            community_resilience: profile.composite.community_resilience,
            social_vulnerability_raw: profile.composite.social_vulnerability,
            category_count: profile
                .all_categories
                .values()
                .filter(|c| c.score > 0.0)
                .count(),
            top_categories: profile.top_categories,
            counties_analyzed: profile.counties_analyzed,
            match_method: profile.match_method,
            coverage_pct: profile.coverage,
            dataset_version: profile.dataset_version,
            dataset_checksum: self.checksum.clone(),
            note: profile.note,
            generated_at: profile.generated_at,
        };

        let parts = metrics.loss_by_structures
            + metrics.loss_by_population
            + metrics.loss_by_agriculture;
        if metrics.loss_total > 0.0 && ((parts - metrics.loss_total) / metrics.loss_total).abs() > 0.01 {
            log::debug!(
                "{}: loss breakdown sums to {parts}, total is {}",
                metrics.entity_id,
                metrics.loss_total
            );
        }

        (metrics, resolution)
    }
}

/// Logs every required field the table lacks. Returns the missing ones.
pub fn validate_columns(table: &HazardTable) -> Vec<&'static str> {
    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !table.has_field(f))
        .collect();
    for field in &missing {
        let tried = table
            .missing
            .iter()
            .find(|m| m.field == *field)
            .map_or_else(|| (*field).to_string(), ToString::to_string);
        log::warn!("Hazard table lacks required field {tried}; dependent metrics will be zero");
    }
    missing
}

/// Loads every input, writes one expanded-metrics artifact per registry
/// entity plus a coverage report, and returns the report.
///
/// # Errors
///
/// Returns [`MetricsError`] if the registry is missing, an input is
/// malformed, or a write fails. A missing hazard table degrades every
/// entity to a zero-valued artifact with an empty checksum.
pub fn run(
    config: &BuildConfig,
    mapping: &ColumnMapping,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CoverageReport, MetricsError> {
    let context = GeoContext::load(config, mapping)?;
    let path = &config.paths.hazard_table;
    let mut table = load_hazard_table(path, mapping)?;

    let checksum = if path.exists() {
        let checksum = file_sha256(path)?;
        checksum::verify(path, &checksum, config.hazard.expected_checksum.as_deref());
        validate_columns(&table);
        checksum
    } else {
        String::new()
    };

    let percentiles = PercentileRankEngine::new(table.rows.values().map(|r| r.risk_score));
    log::info!("National distribution: {} positive risk scores", percentiles.len());

    reconcile(&mut table.rows, context.county_vintage());

    let wildfire = WildfireTable::default();
    let builder = ExpandedMetricsBuilder::new(
        &context,
        &table,
        &wildfire,
        &percentiles,
        &config.hazard.dataset_version,
        &checksum,
    );
    let dir = config.paths.output_dir.join(OUTPUT_SUBDIR);
    Ok(write_metrics(&builder, &context.entities, &dir, progress)?)
}

/// Writes one artifact per entity into `dir` and the coverage report.
///
/// # Errors
///
/// Returns [`GeoError`] if an entity id is not a safe file name or a
/// write fails.
pub fn write_metrics(
    builder: &ExpandedMetricsBuilder<'_>,
    entities: &[GeographicEntity],
    dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CoverageReport, GeoError> {
    progress.set_total(entities.len() as u64);
    let mut tracker = CoverageTracker::new("metrics");
    let mut states = BTreeSet::new();

    for entity in entities {
        progress.set_message(entity.name.clone());
        let (metrics, resolution) = builder.metrics(entity);
        write_json(&entity_artifact_path(dir, &entity.entity_id)?, &metrics)?;
        tracker.record(entity, &resolution);
        states.extend(entity.state_fips());
        progress.inc(1);
    }

    progress.finish(format!(
        "{} metrics artifacts written across {} states",
        entities.len(),
        states.len()
    ));
    tracker.write(dir)
}

#[cfg(test)]
mod tests {
    use tribal_risk_geography::progress::null_progress;
    use tribal_risk_geography_models::CountyWeight;
    use tribal_risk_geography_models::vintage::CountyVintage;

    use super::*;

    fn record(code: &str, risk: f64) -> CountyHazardRecord {
        CountyHazardRecord {
            county_code: code.to_string(),
            risk_score: risk,
            loss_total: 1000.0,
            loss_structures: 600.0,
            loss_population: 300.0,
            loss_agriculture: 100.0,
            loss_population_equivalence: 300.0,
            resilience: 50.0,
            social_vulnerability: 40.0,
            ..CountyHazardRecord::default()
        }
    }

    fn context(counties: &[(&str, f64)]) -> GeoContext {
        let mut context = GeoContext {
            entities: vec![GeographicEntity {
                entity_id: "e1".to_string(),
                name: "Alpha".to_string(),
                states: vec!["CT".to_string()],
            }],
            ..GeoContext::default()
        };
        context
            .entity_boundaries
            .insert("e1".to_string(), vec!["B1".to_string()]);
        context.weights.insert(
            "B1".to_string(),
            counties
                .iter()
                .map(|(c, w)| CountyWeight {
                    county_geoid: (*c).to_string(),
                    overlap_area_sqkm: 1.0,
                    weight: *w,
                })
                .collect(),
        );
        context
    }

    fn table(rows: Vec<CountyHazardRecord>) -> HazardTable {
        HazardTable {
            rows: rows.into_iter().map(|r| (r.county_code.clone(), r)).collect(),
            ..HazardTable::default()
        }
    }

    #[test]
    fn builds_breakdown_and_percentile() {
        let context = context(&[("09001", 0.5), ("09003", 0.5)]);
        let table = table(vec![
            record("09001", 10.0),
            record("09003", 30.0),
            record("04001", 20.0),
        ]);
        let percentiles = PercentileRankEngine::new(table.rows.values().map(|r| r.risk_score));
        let wildfire = WildfireTable::default();
        let builder =
            ExpandedMetricsBuilder::new(&context, &table, &wildfire, &percentiles, "v", "abc123");

        let (m, _) = builder.metrics(&context.entities[0]);
        assert!((m.risk_score - 20.0).abs() < 1e-9);
        assert!((m.risk_percentile - 50.0).abs() < 1e-9);
        assert!((m.loss_by_structures - 600.0).abs() < 1e-9);
        assert!(
            (m.loss_by_structures + m.loss_by_population + m.loss_by_agriculture - m.loss_total)
                .abs()
                < 1e-6
        );
        assert!((m.community_resilience - 50.0).abs() < 1e-9);
        assert_eq!(m.dataset_checksum, "abc123");
        assert_eq!(m.match_method, MatchMethod::AreaWeighted);
        assert!((m.coverage_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn planning_region_table_joins_legacy_crosswalk() {
        let context = context(&[("09001", 1.0)]);
        assert_eq!(context.county_vintage(), Some(CountyVintage::Legacy));

        // 09190 is the primary planning region for legacy 09001.
        let mut table = table(vec![record("09190", 70.0), record("09110", 5.0)]);
        let remapped = reconcile(&mut table.rows, context.county_vintage());
        assert!(remapped > 0);

        let percentiles = PercentileRankEngine::new([5.0, 70.0]);
        let wildfire = WildfireTable::default();
        let builder = ExpandedMetricsBuilder::new(&context, &table, &wildfire, &percentiles, "v", "");
        let (m, resolution) = builder.metrics(&context.entities[0]);
        assert_eq!(resolution.counties().collect::<Vec<_>>(), vec!["09001"]);
        assert!((m.risk_score - 70.0).abs() < 1e-9);
        assert!((m.risk_percentile - 100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_required_columns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nri.csv");
        std::fs::write(&path, "STCOFIPS,RISK_SCORE\n04001,12.5\n").unwrap();
        let table =
            load_hazard_table(&path, &tribal_risk_geography::columns::default_mapping()).unwrap();

        let missing = validate_columns(&table);
        assert!(missing.contains(&"loss_total"));
        assert!(!missing.contains(&"risk_score"));
        assert!(table.rows["04001"].loss_total.abs() < f64::EPSILON);
    }

    #[test]
    fn run_writes_artifacts_with_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuildConfig::default();
        config.paths.registry = dir.path().join("registry.json");
        config.paths.boundary_crosswalk = dir.path().join("links.json");
        config.paths.county_weights = dir.path().join("weights.json");
        config.paths.relationship_file = dir.path().join("rel.csv");
        config.paths.hazard_table = dir.path().join("nri.csv");
        config.paths.output_dir = dir.path().join("out");
        config.hazard.expected_checksum = Some("0".repeat(64));

        std::fs::write(
            &config.paths.registry,
            r#"[{"entity_id": "e1", "name": "Alpha", "states": ["AZ"]}]"#,
        )
        .unwrap();
        std::fs::write(&config.paths.boundary_crosswalk, r#"{"mappings": {"B1": "e1"}}"#).unwrap();
        std::fs::write(
            &config.paths.hazard_table,
            "STCOFIPS,RISK_SCORE,EAL_VALT\n04001,40,100\n04003,60,300\n",
        )
        .unwrap();

        let mapping = tribal_risk_geography::columns::default_mapping();
        let report = run(&config, &mapping, &null_progress()).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.by_method[&MatchMethod::StateFallback], 1);

        let out = config.paths.output_dir.join(OUTPUT_SUBDIR);
        let m: ExpandedMetrics =
            serde_json::from_str(&std::fs::read_to_string(out.join("e1.json")).unwrap()).unwrap();
        assert_eq!(m.dataset_checksum, file_sha256(&config.paths.hazard_table).unwrap());
        assert!((m.risk_score - 50.0).abs() < 1e-9);
        assert!((m.risk_percentile - 50.0).abs() < 1e-9);
        assert!(out.join("coverage_report.json").exists());
    }

    #[test]
    fn run_without_hazard_table_writes_zero_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuildConfig::default();
        config.paths.registry = dir.path().join("registry.json");
        config.paths.boundary_crosswalk = dir.path().join("links.json");
        config.paths.county_weights = dir.path().join("weights.json");
        config.paths.relationship_file = dir.path().join("rel.csv");
        config.paths.hazard_table = dir.path().join("missing_nri.csv");
        config.paths.output_dir = dir.path().join("out");
        std::fs::write(
            &config.paths.registry,
            r#"[{"entity_id": "e1", "name": "Alpha", "states": ["AZ"]}]"#,
        )
        .unwrap();
        std::fs::write(&config.paths.boundary_crosswalk, r#"{"mappings": {"B1": "e1"}}"#).unwrap();

        let mapping = tribal_risk_geography::columns::default_mapping();
        let report = run(&config, &mapping, &null_progress()).unwrap();
        assert_eq!(report.total_entities, 1);
        assert_eq!(report.unmatched, 1);

        let out = config.paths.output_dir.join(OUTPUT_SUBDIR);
        let m: ExpandedMetrics =
            serde_json::from_str(&std::fs::read_to_string(out.join("e1.json")).unwrap()).unwrap();
        assert_eq!(m.counties_analyzed, 0);
        assert!(m.risk_score.abs() < f64::EPSILON);
        assert!(m.risk_percentile.abs() < f64::EPSILON);
        assert!(m.dataset_checksum.is_empty());
        assert!(m.note.is_some());
        assert!(out.join("coverage_report.json").exists());
    }
}
