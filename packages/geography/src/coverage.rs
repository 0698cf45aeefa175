//! Coverage accounting for a builder run.

use std::collections::BTreeMap;
use std::path::Path;

use tribal_risk_geography_models::{
    CoverageReport, GeographicEntity, MatchMethod, StateCoverage, UnmatchedEntity,
};

use crate::GeoError;
use crate::weighting::{CountyResolution, round_to};

/// File name of the coverage report inside a builder's output directory.
pub const COVERAGE_REPORT_FILE: &str = "coverage_report.json";

/// Accumulates per-entity match outcomes into a [`CoverageReport`].
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    builder: String,
    total: usize,
    by_state: BTreeMap<String, StateCoverage>,
    by_method: BTreeMap<MatchMethod, usize>,
    unmatched: Vec<UnmatchedEntity>,
}

impl CoverageTracker {
    /// Creates an empty tracker for `builder`.
    #[must_use]
    pub fn new(builder: &str) -> Self {
        Self {
            builder: builder.to_string(),
            total: 0,
            by_state: BTreeMap::new(),
            by_method: MatchMethod::all().iter().map(|m| (*m, 0)).collect(),
            unmatched: Vec::new(),
        }
    }

    /// Records one entity's resolution.
    pub fn record(&mut self, entity: &GeographicEntity, resolution: &CountyResolution) {
        self.total += 1;
        *self.by_method.entry(resolution.method).or_insert(0) += 1;

        let state = self
            .by_state
            .entry(entity.primary_state().to_string())
            .or_default();
        state.total += 1;

        if resolution.is_matched() {
            state.matched += 1;
        } else {
            self.unmatched.push(UnmatchedEntity {
                entity_id: entity.entity_id.clone(),
                name: entity.name.clone(),
                reason: resolution
                    .note
                    .clone()
                    .unwrap_or_else(|| "no matched counties".to_string()),
            });
        }
    }

    /// Entities matched so far.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.total - self.unmatched.len()
    }

    /// Builds the report, stamped with the current time.
    #[must_use]
    pub fn report(&self) -> CoverageReport {
        let matched = self.matched();
        #[allow(clippy::cast_precision_loss)]
        let match_pct = if self.total == 0 {
            0.0
        } else {
            round_to(matched as f64 / self.total as f64 * 100.0, 2)
        };
        let mut unmatched_entities = self.unmatched.clone();
        unmatched_entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        CoverageReport {
            builder: self.builder.clone(),
            total_entities: self.total,
            matched,
            unmatched: self.unmatched.len(),
            match_pct,
            by_state: self.by_state.clone(),
            by_method: self.by_method.clone(),
            unmatched_entities,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Writes the report to `<dir>/coverage_report.json` and logs a
    /// summary.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the write fails.
    pub fn write(&self, dir: &Path) -> Result<CoverageReport, GeoError> {
        let report = self.report();
        crate::atomic::write_json(&dir.join(COVERAGE_REPORT_FILE), &report)?;
        log::info!(
            "{}: {}/{} entities matched ({}%), {} unmatched",
            report.builder,
            report.matched,
            report.total_entities,
            report.match_pct,
            report.unmatched
        );
        Ok(report)
    }
}
