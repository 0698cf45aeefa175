#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic entity, boundary crosswalk, and build configuration types.
//!
//! These types describe the administrative areas being profiled, the
//! boundary-to-county overlap weights that tie them to county-level
//! source tables, and the coverage accounting every builder emits. They
//! carry no I/O; loading and writing lives in `tribal_risk_geography`.

pub mod config;
pub mod fips;
pub mod vintage;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// One administrative area being profiled (e.g. a Tribal Nation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicEntity {
    /// Stable identifier; also the per-entity artifact file stem.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// State references as listed in the registry (abbreviations or FIPS).
    #[serde(default)]
    pub states: Vec<String>,
}

impl GeographicEntity {
    /// The entity's states normalized to two-digit FIPS codes, sorted and
    /// deduplicated. Unrecognized references are dropped.
    #[must_use]
    pub fn state_fips(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = self
            .states
            .iter()
            .filter_map(|s| fips::normalize_state(s))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// First state abbreviation, used for per-state coverage breakdowns.
    #[must_use]
    pub fn primary_state(&self) -> &str {
        self.state_fips()
            .first()
            .and_then(|f| fips::by_fips(f))
            .map_or("??", |s| s.abbr)
    }
}

/// On-disk boundary -> entity mapping produced by the name-matching step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryEntityFile {
    /// `boundary_id -> entity_id`.
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
}

/// One weighted boundary -> county link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyWeight {
    /// Five-digit zero-padded county code.
    pub county_geoid: String,
    /// Intersection area in square kilometers (4 decimal places).
    pub overlap_area_sqkm: f64,
    /// Normalized weight; weights for one boundary sum to 1.0.
    pub weight: f64,
}

/// Per-region statistics recorded in the crosswalk metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStats {
    /// EPSG identifier of the equal-area projection used.
    pub projection: String,
    /// Boundaries in the region.
    pub boundaries: usize,
    /// Counties in the region.
    pub counties: usize,
    /// Links kept after sliver filtering.
    pub links: usize,
    /// Whether the overlay failed and the region was skipped.
    pub skipped: bool,
}

/// Build metadata carried by the crosswalk artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkMetadata {
    /// Artifact format version.
    pub version: String,
    /// Projection identifiers used, one per region.
    pub projections: Vec<String>,
    /// Minimum overlap fraction (inclusive) a link must reach.
    pub min_overlap: f64,
    /// Boundaries with at least one link.
    pub boundary_count: usize,
    /// Distinct counties referenced by any link.
    pub county_count: usize,
    /// Total links across all boundaries.
    pub link_count: usize,
    /// Links dropped as slivers.
    pub slivers_dropped: usize,
    /// Boundaries whose every overlap fell below the threshold.
    pub boundaries_without_links: Vec<String>,
    /// Statistics per region, keyed by region name.
    pub regions: BTreeMap<String, RegionStats>,
    /// RFC 3339 build timestamp.
    pub generated_at: String,
}

/// The boundary -> county weighting table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkArtifact {
    /// Build metadata.
    pub metadata: CrosswalkMetadata,
    /// `boundary_id -> weighted county links`.
    pub crosswalk: BTreeMap<String, Vec<CountyWeight>>,
}

/// Which fallback tier produced an entity's county set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchMethod {
    /// Area weights from the polygon crosswalk.
    AreaWeighted,
    /// Equal weights over the boundary -> county relationship file.
    RelationshipFile,
    /// Equal weights over every county in the entity's states.
    StateFallback,
    /// No county could be matched.
    Unmatched,
}

impl MatchMethod {
    /// All tiers in fallback order, followed by [`Self::Unmatched`].
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AreaWeighted,
            Self::RelationshipFile,
            Self::StateFallback,
            Self::Unmatched,
        ]
    }
}

/// Matched/total counts for one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCoverage {
    /// Entities whose primary state is this state.
    pub total: usize,
    /// Of those, entities matched to at least one county.
    pub matched: usize,
}

/// An entity that could not be matched to source data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedEntity {
    /// Entity identifier.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// Why it went unmatched.
    pub reason: String,
}

/// Auditable coverage summary written next to each builder's artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Builder that produced the report (e.g. `"hazards"`).
    pub builder: String,
    /// Entities in the registry.
    pub total_entities: usize,
    /// Entities matched to at least one county.
    pub matched: usize,
    /// Entities emitted with a zero-valued profile.
    pub unmatched: usize,
    /// `matched / total_entities * 100`, rounded to 2 decimal places.
    pub match_pct: f64,
    /// Breakdown by primary state abbreviation.
    pub by_state: BTreeMap<String, StateCoverage>,
    /// Entities per fallback tier.
    pub by_method: BTreeMap<MatchMethod, usize>,
    /// Every unmatched entity, sorted by id.
    pub unmatched_entities: Vec<UnmatchedEntity>,
    /// RFC 3339 timestamp.
    pub generated_at: String,
}
