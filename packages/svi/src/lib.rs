#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reduced-theme social vulnerability profiles.
//!
//! Theme percentiles are area-weighted over each entity's informative
//! counties. Coverage is the matched share of the linked weight, so a
//! heavily weighted suppressed county lowers coverage even when smaller
//! counties matched.

pub mod table;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tribal_risk_geography::GeoError;
use tribal_risk_geography::atomic::{entity_artifact_path, write_json};
use tribal_risk_geography::context::GeoContext;
use tribal_risk_geography::coverage::CoverageTracker;
use tribal_risk_geography::progress::ProgressCallback;
use tribal_risk_geography::vintage::reconcile;
use tribal_risk_geography::weighting::{CountyResolution, round_to};
use tribal_risk_geography_models::config::{BuildConfig, ColumnMapping};
use tribal_risk_geography_models::{CoverageReport, GeographicEntity};
use tribal_risk_svi_models::{
    GAP_ALASKA_PARTIAL, GAP_MISSING, MISSING_COVERAGE_THRESHOLD, ProfileValidationError, SviTheme,
    ThemeScore, VulnerabilityProfile, theme_mean,
};

pub use table::{SviRecord, SviTable, load_svi_table};

/// Subdirectory of the output directory holding vulnerability profiles.
pub const OUTPUT_SUBDIR: &str = "svi";

/// Errors that can occur while building vulnerability profiles.
#[derive(Debug, Error)]
pub enum SviError {
    /// Loading inputs or writing artifacts failed.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// A built profile broke a structural invariant.
    #[error("Invalid vulnerability profile for {entity_id}: {source}")]
    Validation {
        /// Entity whose profile failed.
        entity_id: String,
        /// What was wrong.
        source: ProfileValidationError,
    },
}

/// Builds [`VulnerabilityProfile`]s from a loaded SVI table.
#[derive(Debug)]
pub struct SocialVulnerabilityBuilder<'a> {
    context: &'a GeoContext,
    table: &'a SviTable,
    available: BTreeSet<String>,
    source_year: u16,
    high_latitude_state: String,
}

impl<'a> SocialVulnerabilityBuilder<'a> {
    /// Creates a builder. Every county in the table is available for
    /// matching; non-informative ones are dropped after the tier is chosen.
    #[must_use]
    pub fn new(
        context: &'a GeoContext,
        table: &'a SviTable,
        source_year: u16,
        high_latitude_state: &str,
    ) -> Self {
        Self {
            context,
            table,
            available: table.county_codes(),
            source_year,
            high_latitude_state: high_latitude_state.to_string(),
        }
    }

    /// Builds the profile for one entity, together with the county
    /// resolution it was computed from.
    #[must_use]
    pub fn profile(&self, entity: &GeographicEntity) -> (VulnerabilityProfile, CountyResolution) {
        let resolution = self.context.resolve(entity, &self.available);
        let linked = resolution.counties_analyzed();
        let resolution = resolution.retain(
            |code| self.table.get(code).is_some_and(SviRecord::is_informative),
            || {
                format!(
                    "All {linked} counties matched to {} have suppressed or zero theme values; all values are zero",
                    entity.name
                )
            },
        );

        let themes: Vec<ThemeScore> = SviTheme::INCLUDED
            .iter()
            .map(|theme| {
                let percentile = resolution
                    .weighted_mean(|code| self.table.get(code).map_or(0.0, |r| r.theme(*theme)));
                let flags = resolution
                    .weighted_mean(|code| self.table.get(code).map_or(0.0, |r| r.flags(*theme)));
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let flag_count = flags.round().max(0.0) as u32;
                ThemeScore {
                    theme_id: theme.id(),
                    name: theme.name().to_string(),
                    percentile: round_to(percentile, 4).clamp(0.0, 1.0),
                    flag_count,
                }
            })
            .collect();

        let coverage = round_to(resolution.coverage, 4).clamp(0.0, 1.0);
        let profile = VulnerabilityProfile {
            entity_id: entity.entity_id.clone(),
            entity_name: entity.name.clone(),
            composite: theme_mean(&themes),
            themes,
            coverage_pct: coverage,
            counties_matched: resolution.counties_analyzed(),
            match_method: resolution.method,
            source_year: self.source_year,
            data_gaps: self.data_gaps(entity, coverage),
            note: resolution.note.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        };
        (profile, resolution)
    }

    fn data_gaps(&self, entity: &GeographicEntity, coverage: f64) -> Vec<String> {
        let mut gaps = Vec::new();
        if coverage < MISSING_COVERAGE_THRESHOLD {
            gaps.push(GAP_MISSING.to_string());
        }
        if coverage < 1.0
            && entity
                .state_fips()
                .iter()
                .any(|s| *s == self.high_latitude_state)
        {
            gaps.push(GAP_ALASKA_PARTIAL.to_string());
        }
        gaps
    }
}

/// Loads every input, writes one vulnerability profile per registry
/// entity plus a coverage report, and returns the report.
///
/// # Errors
///
/// Returns [`SviError`] if the registry is missing, an input is
/// malformed, a profile fails validation, or a write fails. A missing SVI
/// table degrades every entity to a zero-valued profile.
pub fn run(
    config: &BuildConfig,
    mapping: &ColumnMapping,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CoverageReport, SviError> {
    let context = GeoContext::load(config, mapping)?;
    let mut table = load_svi_table(&config.paths.svi_table, mapping)?;
    reconcile(&mut table.rows, context.county_vintage());

    let builder = SocialVulnerabilityBuilder::new(
        &context,
        &table,
        config.svi.source_year,
        &config.crosswalk.high_latitude_state,
    );
    let dir = config.paths.output_dir.join(OUTPUT_SUBDIR);
    write_profiles(&builder, &context.entities, &dir, progress)
}

/// Validates and writes one profile per entity into `dir`, then the
/// coverage report.
///
/// # Errors
///
/// Returns [`SviError`] if a profile fails validation, an entity id is
/// not a safe file name, or a write fails.
pub fn write_profiles(
    builder: &SocialVulnerabilityBuilder<'_>,
    entities: &[GeographicEntity],
    dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CoverageReport, SviError> {
    progress.set_total(entities.len() as u64);
    let mut tracker = CoverageTracker::new("svi");
    let mut gaps = 0usize;

    for entity in entities {
        progress.set_message(entity.name.clone());
        let (profile, resolution) = builder.profile(entity);
        profile.validate().map_err(|source| SviError::Validation {
            entity_id: entity.entity_id.clone(),
            source,
        })?;
        if !profile.data_gaps.is_empty() {
            gaps += 1;
        }
        write_json(&entity_artifact_path(dir, &entity.entity_id)?, &profile)?;
        tracker.record(entity, &resolution);
        progress.inc(1);
    }

    log::info!("{gaps} of {} vulnerability profiles carry data gaps", entities.len());
    progress.finish(format!("{} vulnerability profiles written", entities.len()));
    Ok(tracker.write(dir)?)
}

#[cfg(test)]
mod tests {
    use tribal_risk_geography::columns::default_mapping;
    use tribal_risk_geography::progress::null_progress;
    use tribal_risk_geography_models::{CountyWeight, MatchMethod};

    use super::*;

    fn entity(id: &str, states: &[&str]) -> GeographicEntity {
        GeographicEntity {
            entity_id: id.to_string(),
            name: format!("Entity {id}"),
            states: states.iter().map(ToString::to_string).collect(),
        }
    }

    fn row(code: &str, themes: [f64; 4], flags: [f64; 4]) -> SviRecord {
        SviRecord {
            county_code: code.to_string(),
            state: String::new(),
            themes,
            flags,
        }
    }

    fn link(county: &str, weight: f64) -> CountyWeight {
        CountyWeight {
            county_geoid: county.to_string(),
            overlap_area_sqkm: 1.0,
            weight,
        }
    }

    fn context(links: Vec<CountyWeight>, states: &[&str]) -> GeoContext {
        let mut context = GeoContext {
            entities: vec![entity("e1", states)],
            ..GeoContext::default()
        };
        context
            .entity_boundaries
            .insert("e1".to_string(), vec!["B1".to_string()]);
        context.weights.insert("B1".to_string(), links);
        context
    }

    fn table(rows: Vec<SviRecord>) -> SviTable {
        SviTable {
            rows: rows.into_iter().map(|r| (r.county_code.clone(), r)).collect(),
            skipped: 0,
        }
    }

    #[test]
    fn composite_is_mean_of_included_themes() {
        let context = context(vec![link("04001", 0.5), link("04003", 0.5)], &["AZ"]);
        let table = table(vec![
            row("04001", [0.2, 0.4, 0.99, 0.6], [2.0, 1.0, 5.0, 3.0]),
            row("04003", [0.4, 0.6, 0.99, 0.8], [4.0, 1.0, 5.0, 1.0]),
        ]);
        let builder = SocialVulnerabilityBuilder::new(&context, &table, 2022, "02");

        let (p, _) = builder.profile(&context.entities[0]);
        let percentiles: Vec<f64> = p.themes.iter().map(|t| t.percentile).collect();
        assert!((percentiles[0] - 0.3).abs() < 1e-9);
        assert!((percentiles[1] - 0.5).abs() < 1e-9);
        assert!((percentiles[2] - 0.7).abs() < 1e-9);
        assert!((p.composite - 0.5).abs() < 1e-9);
        assert_eq!(p.themes[0].flag_count, 3);
        assert_eq!(p.themes[2].flag_count, 2);
        assert_eq!(p.source_year, 2022);
        assert!(p.data_gaps.is_empty());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn all_zero_county_is_excluded_and_lowers_coverage() {
        let context = context(vec![link("04001", 0.3), link("04003", 0.7)], &["AZ"]);
        let table = table(vec![
            row("04001", [0.5, 0.5, 0.0, 0.5], [0.0; 4]),
            row("04003", [0.0, 0.0, 0.8, 0.0], [0.0; 4]),
        ]);
        let builder = SocialVulnerabilityBuilder::new(&context, &table, 2022, "02");

        let (p, _) = builder.profile(&context.entities[0]);
        assert_eq!(p.counties_matched, 1);
        assert!((p.coverage_pct - 0.3).abs() < 1e-9);
        assert!((p.composite - 0.5).abs() < 1e-9);
        assert_eq!(p.data_gaps, vec![GAP_MISSING.to_string()]);
    }

    #[test]
    fn fully_suppressed_entity_does_not_fall_back_to_state() {
        let context = context(vec![link("04001", 1.0)], &["AZ"]);
        let table = table(vec![
            row("04001", [0.0, 0.0, 0.7, 0.0], [0.0; 4]),
            row("04003", [0.8, 0.8, 0.8, 0.8], [1.0; 4]),
            row("04005", [0.9, 0.9, 0.9, 0.9], [1.0; 4]),
        ]);
        let builder = SocialVulnerabilityBuilder::new(&context, &table, 2022, "02");

        let (p, resolution) = builder.profile(&context.entities[0]);
        assert!(!resolution.is_matched());
        assert_eq!(p.match_method, MatchMethod::Unmatched);
        assert_eq!(p.counties_matched, 0);
        assert!(p.coverage_pct.abs() < f64::EPSILON);
        assert!(p.composite.abs() < f64::EPSILON);
        assert_eq!(p.data_gaps, vec![GAP_MISSING.to_string()]);
        assert!(p.note.as_deref().is_some_and(|n| n.contains("suppressed")));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn high_latitude_partial_coverage_is_tagged() {
        let context = context(vec![link("02013", 0.8), link("02016", 0.2)], &["AK"]);
        let table = table(vec![row("02013", [0.5, 0.5, 0.5, 0.5], [0.0; 4])]);
        let builder = SocialVulnerabilityBuilder::new(&context, &table, 2022, "02");

        let (p, _) = builder.profile(&context.entities[0]);
        assert!((p.coverage_pct - 0.8).abs() < 1e-9);
        assert_eq!(p.data_gaps, vec![GAP_ALASKA_PARTIAL.to_string()]);
    }

    #[test]
    fn unmatched_entity_is_zero_and_missing() {
        let context = context(Vec::new(), &["AZ"]);
        let table = table(Vec::new());
        let builder = SocialVulnerabilityBuilder::new(&context, &table, 2022, "02");

        let (p, _) = builder.profile(&context.entities[0]);
        assert_eq!(p.counties_matched, 0);
        assert_eq!(p.match_method, MatchMethod::Unmatched);
        assert!(p.composite.abs() < f64::EPSILON);
        assert_eq!(p.themes.len(), 3);
        assert!(p.data_gaps.contains(&GAP_MISSING.to_string()));
        assert!(p.note.is_some());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn writes_validated_profiles() {
        let context = context(vec![link("04001", 1.0)], &["AZ"]);
        let table = table(vec![row("04001", [0.1, 0.2, 0.3, 0.3], [1.0; 4])]);
        let builder = SocialVulnerabilityBuilder::new(&context, &table, 2020, "02");
        let dir = tempfile::tempdir().unwrap();

        let report = write_profiles(&builder, &context.entities, dir.path(), &null_progress()).unwrap();
        assert_eq!(report.matched, 1);

        let written: VulnerabilityProfile =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("e1.json")).unwrap())
                .unwrap();
        assert!(written.validate().is_ok());
        assert_eq!(written.source_year, 2020);
    }

    #[test]
    fn run_without_svi_table_writes_zero_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuildConfig::default();
        config.paths.registry = dir.path().join("registry.json");
        config.paths.boundary_crosswalk = dir.path().join("links.json");
        config.paths.county_weights = dir.path().join("weights.json");
        config.paths.relationship_file = dir.path().join("rel.csv");
        config.paths.svi_table = dir.path().join("missing_svi.csv");
        config.paths.output_dir = dir.path().join("out");
        std::fs::write(
            &config.paths.registry,
            r#"[{"entity_id": "e1", "name": "Alpha", "states": ["AZ"]}]"#,
        )
        .unwrap();

        let report = run(&config, &default_mapping(), &null_progress()).unwrap();
        assert_eq!(report.unmatched, 1);

        let out = config.paths.output_dir.join(OUTPUT_SUBDIR);
        let written: VulnerabilityProfile =
            serde_json::from_str(&std::fs::read_to_string(out.join("e1.json")).unwrap()).unwrap();
        assert_eq!(written.counties_matched, 0);
        assert_eq!(written.data_gaps, vec![GAP_MISSING.to_string()]);
        assert!(written.note.is_some());
        assert!(written.validate().is_ok());
        assert!(out.join("coverage_report.json").exists());
    }
}
