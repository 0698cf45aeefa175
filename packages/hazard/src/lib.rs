#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area-weighted hazard profile aggregation.
//!
//! Each entity is resolved to weighted counties (see
//! [`tribal_risk_geography::weighting`]), then every composite and
//! per-category value is the weighted mean over those counties. The
//! wildfire category can be overridden from an independent dataset, in
//! which case the top-category ranking is recomputed.

pub mod table;
pub mod wildfire;

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
use tribal_risk_hazard_models::{
    CategoryProfile, CompositeRisk, HazardCategory, HazardProfile, RiskRating, WILDFIRE_DATA_SOURCE,
};

pub use table::{CategoryValues, CountyHazardRecord, HazardTable, load_hazard_table};
pub use wildfire::{WildfireTable, load_wildfire};

/// Subdirectory of the output directory holding hazard profiles.
pub const OUTPUT_SUBDIR: &str = "hazard";

/// Errors that can occur while building hazard profiles.
#[derive(Debug, Error)]
pub enum HazardError {
    /// Loading inputs or writing artifacts failed.
    #[error(transparent)]
    Geo(#[from] GeoError),
}

/// Builds [`HazardProfile`]s from a loaded hazard table.
#[derive(Debug)]
pub struct HazardAggregationEngine<'a> {
    context: &'a GeoContext,
    table: &'a HazardTable,
    wildfire: &'a WildfireTable,
    dataset_version: String,
    available: BTreeSet<String>,
}

impl<'a> HazardAggregationEngine<'a> {
    /// Creates an engine over already-loaded inputs.
    #[must_use]
    pub fn new(
        context: &'a GeoContext,
        table: &'a HazardTable,
        wildfire: &'a WildfireTable,
        dataset_version: &str,
    ) -> Self {
        Self {
            context,
            table,
            wildfire,
            dataset_version: dataset_version.to_string(),
            available: table.county_codes(),
        }
    }

    /// Builds the profile for one entity, together with the county
    /// resolution it was computed from.
    #[must_use]
    pub fn profile(&self, entity: &GeographicEntity) -> (HazardProfile, CountyResolution) {
        let resolution = self.context.resolve(entity, &self.available);
        let mut profile = self.aggregate(entity, &resolution);

        if resolution.is_matched() {
            let boundaries = self.context.boundaries_of(&entity.entity_id);
            if let Some(value) = self.wildfire.lookup(boundaries, &entity.name) {
                apply_wildfire_override(&mut profile, value);
            }
        }
        profile.rank_top_categories();

        (profile, resolution)
    }

    fn aggregate(&self, entity: &GeographicEntity, resolution: &CountyResolution) -> HazardProfile {
        let mean = |f: fn(&CountyHazardRecord) -> f64, places: i32| {
            round_to(weighted(self.table, resolution, f), places)
        };

        let score = mean(|r| r.risk_score, 2);
        let composite = CompositeRisk {
            score,
            rating: RiskRating::label(score),
            loss_total: mean(|r| r.loss_total, 2),
            community_resilience: mean(|r| r.resilience, 2),
            social_vulnerability: mean(|r| r.social_vulnerability, 2),
        };

        let all_categories = HazardCategory::ALL
            .iter()
            .map(|category| {
                let c = *category;
                let score = round_to(weighted(self.table, resolution, |r| r.category(c).score), 2);
                let value = |f: fn(&CategoryValues) -> f64, places: i32| {
                    round_to(weighted(self.table, resolution, |r| f(r.category(c))), places)
                };
                (c.code().to_string(), CategoryProfile {
                    score,
                    rating: RiskRating::label(score),
                    loss_total: value(|v| v.loss, 2),
                    annualized_frequency: value(|v| v.frequency, 4),
                    event_count: value(|v| v.events, 2),
                    data_source: None,
                    nri_score: None,
                })
            })
            .collect();

        HazardProfile {
            entity_id: entity.entity_id.clone(),
            entity_name: entity.name.clone(),
            dataset_version: self.dataset_version.clone(),
            counties_analyzed: resolution.counties_analyzed(),
            match_method: resolution.method,
            coverage: round_to(resolution.coverage, 4),
            composite,
            top_categories: Vec::new(),
            all_categories,
            note: resolution.note.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Weighted mean of `value` over the resolved counties. Counties missing
/// from the table contribute zero.
fn weighted(
    table: &HazardTable,
    resolution: &CountyResolution,
    value: impl Fn(&CountyHazardRecord) -> f64,
) -> f64 {
    resolution.weighted_mean(|code| table.get(code).map_or(0.0, &value))
}

/// Replaces the wildfire category score with `value`.
///
/// Only fires when both `value` and the current wildfire score are
/// non-zero. Returns whether the override was applied.
pub fn apply_wildfire_override(profile: &mut HazardProfile, value: f64) -> bool {
    let Some(slot) = profile.all_categories.get_mut(HazardCategory::Wildfire.code()) else {
        return false;
    };
    if value <= 0.0 || slot.score <= 0.0 {
        return false;
    }

    let value = round_to(value, 2);
    log::debug!(
        "{}: wildfire score {} -> {value} ({WILDFIRE_DATA_SOURCE})",
        profile.entity_id,
        slot.score
    );
    slot.nri_score = Some(slot.score);
    slot.score = value;
    slot.rating = RiskRating::label(value);
    slot.data_source = Some(WILDFIRE_DATA_SOURCE.to_string());
    true
}

/// Loads every input, writes one hazard profile per registry entity plus
/// a coverage report, and returns the report.
///
/// # Errors
///
/// Returns [`HazardError`] if the registry is missing, an input is
/// malformed, or a write fails. A missing hazard table degrades every
/// entity to a zero-valued profile with a note.
pub fn run(
    config: &BuildConfig,
    mapping: &ColumnMapping,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CoverageReport, HazardError> {
    let context = GeoContext::load(config, mapping)?;
    let mut table = load_hazard_table(&config.paths.hazard_table, mapping)?;
    reconcile(&mut table.rows, context.county_vintage());
    let wildfire = load_wildfire(&config.paths.wildfire_table, mapping)?;

    let engine = HazardAggregationEngine::new(
        &context,
        &table,
        &wildfire,
        &config.hazard.dataset_version,
    );
    let dir = config.paths.output_dir.join(OUTPUT_SUBDIR);
    Ok(write_profiles(&engine, &context.entities, &dir, progress)?)
}

/// Writes one profile per entity into `dir` and the coverage report.
///
/// # Errors
///
/// Returns [`GeoError`] if an entity id is not a safe file name or a
/// write fails.
pub fn write_profiles(
    engine: &HazardAggregationEngine<'_>,
    entities: &[GeographicEntity],
    dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CoverageReport, GeoError> {
    progress.set_total(entities.len() as u64);
    let mut tracker = CoverageTracker::new("hazard");
    let mut overrides = 0usize;

    for entity in entities {
        progress.set_message(entity.name.clone());
        let (profile, resolution) = engine.profile(entity);
        if profile
            .all_categories
            .get(HazardCategory::Wildfire.code())
            .is_some_and(|c| c.data_source.is_some())
        {
            overrides += 1;
        }
        write_json(&entity_artifact_path(dir, &entity.entity_id)?, &profile)?;
        tracker.record(entity, &resolution);
        progress.inc(1);
    }

    log::info!("Applied wildfire override to {overrides} profiles");
    progress.finish(format!("{} hazard profiles written", entities.len()));
    tracker.write(dir)
}
