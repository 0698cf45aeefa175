//! Build configuration and column-mapping types.
//!
//! A [`BuildConfig`] is deserialized from TOML with every field
//! defaulted, so an empty file yields a usable configuration rooted at
//! `data/`. Column names for each input table are not hard-coded at use
//! sites; they come from a versioned [`ColumnMapping`] that lists the
//! candidate headers for every logical field.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fips::ALASKA_FIPS;

/// Table names used as keys in [`ColumnMapping::tables`].
pub mod tables {
    /// Boundary polygon properties.
    pub const BOUNDARIES: &str = "boundaries";
    /// County polygon properties.
    pub const COUNTIES: &str = "counties";
    /// Boundary -> county relationship file.
    pub const RELATIONSHIP: &str = "relationship";
    /// County hazard table.
    pub const HAZARD: &str = "hazard";
    /// Independent wildfire dataset.
    pub const WILDFIRE: &str = "wildfire";
    /// County social vulnerability table.
    pub const SVI: &str = "svi";
}

/// Top-level build configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Crosswalk build parameters.
    pub crosswalk: CrosswalkConfig,
    /// Hazard dataset parameters.
    pub hazard: HazardConfig,
    /// Social vulnerability dataset parameters.
    pub svi: SviConfig,
    /// Column mapping override.
    pub columns: ColumnsConfig,
}

/// Input and output file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Entity registry JSON.
    pub registry: PathBuf,
    /// Boundary -> entity mapping JSON.
    pub boundary_crosswalk: PathBuf,
    /// Boundary -> county weight artifact (crosswalk output).
    pub county_weights: PathBuf,
    /// Boundary -> county relationship CSV (fallback tier 2).
    pub relationship_file: PathBuf,
    /// Boundary polygons (`GeoJSON`).
    pub boundaries_geojson: PathBuf,
    /// County polygons (`GeoJSON`).
    pub counties_geojson: PathBuf,
    /// County hazard table CSV.
    pub hazard_table: PathBuf,
    /// Wildfire dataset CSV.
    pub wildfire_table: PathBuf,
    /// County social vulnerability CSV.
    pub svi_table: PathBuf,
    /// Root directory for per-entity artifacts.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("data/registry.json"),
            boundary_crosswalk: PathBuf::from("data/crosswalk/boundary_entity.json"),
            county_weights: PathBuf::from("data/crosswalk/county_weights.json"),
            relationship_file: PathBuf::from("data/crosswalk/boundary_county_relationship.csv"),
            boundaries_geojson: PathBuf::from("data/boundaries/aiannh.geojson"),
            counties_geojson: PathBuf::from("data/boundaries/counties.geojson"),
            hazard_table: PathBuf::from("data/nri/NRI_Table_Counties.csv"),
            wildfire_table: PathBuf::from("data/wildfire/wildfire_risk.csv"),
            svi_table: PathBuf::from("data/svi/SVI_2022_US_county.csv"),
            output_dir: PathBuf::from("data/output"),
        }
    }
}

/// Crosswalk build parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosswalkConfig {
    /// Minimum `intersection / boundary` area fraction (inclusive).
    pub min_overlap: f64,
    /// State FIPS code of the region projected separately.
    pub high_latitude_state: String,
}

impl Default for CrosswalkConfig {
    fn default() -> Self {
        Self {
            min_overlap: 0.01,
            high_latitude_state: ALASKA_FIPS.to_string(),
        }
    }
}

/// Hazard dataset parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Version label stamped into every artifact.
    pub dataset_version: String,
    /// Pinned SHA-256 of the hazard table; a mismatch only warns.
    pub expected_checksum: Option<String>,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            dataset_version: "NRI v1.20".to_string(),
            expected_checksum: None,
        }
    }
}

/// Social vulnerability dataset parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SviConfig {
    /// Release year stamped into every artifact.
    pub source_year: u16,
}

impl Default for SviConfig {
    fn default() -> Self {
        Self { source_year: 2022 }
    }
}

/// Optional override of the embedded column mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    /// Path to a column mapping TOML replacing the built-in one.
    pub path: Option<PathBuf>,
}

/// Candidate header names for each logical field, per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Mapping format version.
    pub version: u32,
    /// `table -> field -> candidates` in priority order. A `{code}`
    /// placeholder in a candidate is substituted per hazard category.
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl ColumnMapping {
    /// Candidate headers for `table.field`, empty if not configured.
    #[must_use]
    pub fn candidates(&self, table: &str, field: &str) -> &[String] {
        self.tables
            .get(table)
            .and_then(|t| t.get(field))
            .map_or(&[][..], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: BuildConfig = toml::from_str("").unwrap();
        assert_eq!(config, BuildConfig::default());
        assert!((config.crosswalk.min_overlap - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.crosswalk.high_latitude_state, "02");
        assert_eq!(config.svi.source_year, 2022);
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let config: BuildConfig = toml::from_str(
            r#"
            [paths]
            output_dir = "out"

            [hazard]
            expected_checksum = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.paths.registry, PathBuf::from("data/registry.json"));
        assert_eq!(config.hazard.expected_checksum.as_deref(), Some("abc123"));
        assert_eq!(config.hazard.dataset_version, "NRI v1.20");
    }

    #[test]
    fn missing_candidates_are_empty() {
        let mapping = ColumnMapping::default();
        assert!(mapping.candidates(tables::HAZARD, "risk_score").is_empty());
    }
}
