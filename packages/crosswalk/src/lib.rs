#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area-weighted boundary -> county crosswalk construction.
//!
//! Boundaries and counties are split into a high-latitude region and
//! everything else, each overlaid in its own equal-area projection.
//! Every intersection becomes a fraction of its boundary's area; links
//! below the minimum overlap are dropped as digitization slivers and the
//! survivors are renormalized so each boundary's weights sum to 1.0.

pub mod features;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tribal_risk_geography::GeoError;
use tribal_risk_geography::progress::ProgressCallback;
use tribal_risk_geography::weighting::round_to;
use tribal_risk_geography_models::config::{BuildConfig, ColumnMapping};
use tribal_risk_geography_models::{CountyWeight, CrosswalkArtifact, CrosswalkMetadata, RegionStats};
use tribal_risk_spatial::{EqualAreaCrs, GeoOverlay, OverlayBackend, overlay_pairs};

pub use features::{BoundaryFeature, CountyFeature, load_boundaries, load_counties};

/// Format version written into the artifact metadata.
pub const CROSSWALK_VERSION: &str = "1.0";

/// Region name for boundaries in the high-latitude state.
pub const HIGH_LATITUDE_REGION: &str = "high_latitude";

/// Region name for every other boundary.
pub const OTHER_REGION: &str = "other";

/// Fractions this close below the threshold still count as meeting it.
const THRESHOLD_TOLERANCE: f64 = 1e-12;

/// Errors that can occur while building the crosswalk.
#[derive(Debug, Error)]
pub enum CrosswalkError {
    /// Loading inputs or writing the artifact failed.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The builder was configured with an unusable value.
    #[error("Invalid crosswalk configuration: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Accumulated overlap between one boundary id and one county.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlapShare {
    /// Intersection area in square kilometers.
    pub area_sqkm: f64,
    /// Intersection area divided by the boundary's total area.
    pub fraction: f64,
}

/// Raw overlaps grouped by boundary id, then county code.
pub type RawOverlaps = BTreeMap<String, BTreeMap<String, OverlapShare>>;

/// Output of [`filter_and_normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedCrosswalk {
    /// `boundary_id -> links`, weights summing to 1.0 per boundary.
    pub links: BTreeMap<String, Vec<CountyWeight>>,
    /// Links dropped below the threshold.
    pub slivers_dropped: usize,
    /// Boundaries that had overlaps but lost all of them to the threshold.
    pub boundaries_without_links: Vec<String>,
}

/// Drops links below `min_overlap` (inclusive) and renormalizes the
/// remaining fractions per boundary.
///
/// Weights are rounded to 6 decimal places and areas to 4. Links are
/// ordered by descending weight, then county code.
#[must_use]
pub fn filter_and_normalize(raw: &RawOverlaps, min_overlap: f64) -> NormalizedCrosswalk {
    let mut out = NormalizedCrosswalk::default();

    for (boundary_id, counties) in raw {
        let kept: Vec<(&String, &OverlapShare)> = counties
            .iter()
            .filter(|(_, share)| share.fraction + THRESHOLD_TOLERANCE >= min_overlap)
            .collect();
        out.slivers_dropped += counties.len() - kept.len();

        let total: f64 = kept.iter().map(|(_, share)| share.fraction).sum();
        if kept.is_empty() || total <= 0.0 {
            out.boundaries_without_links.push(boundary_id.clone());
            continue;
        }

        let mut links: Vec<CountyWeight> = kept
            .into_iter()
            .map(|(county, share)| CountyWeight {
                county_geoid: county.clone(),
                overlap_area_sqkm: round_to(share.area_sqkm, 4),
                weight: round_to(share.fraction / total, 6),
            })
            .collect();
        links.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.county_geoid.cmp(&b.county_geoid))
        });
        out.links.insert(boundary_id.clone(), links);
    }

    out
}

/// Builds the boundary -> county crosswalk from polygon layers.
pub struct CrosswalkBuilder {
    min_overlap: f64,
    high_latitude_state: String,
    backend: Box<dyn OverlayBackend>,
}

impl std::fmt::Debug for CrosswalkBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrosswalkBuilder")
            .field("min_overlap", &self.min_overlap)
            .field("high_latitude_state", &self.high_latitude_state)
            .finish_non_exhaustive()
    }
}

impl CrosswalkBuilder {
    /// Creates a builder using the `geo` overlay backend.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswalkError::Config`] if `min_overlap` is not in
    /// `[0, 1)`.
    pub fn new(min_overlap: f64, high_latitude_state: &str) -> Result<Self, CrosswalkError> {
        Self::with_backend(min_overlap, high_latitude_state, Box::new(GeoOverlay))
    }

    /// Creates a builder over an arbitrary overlay backend.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswalkError::Config`] if `min_overlap` is not in
    /// `[0, 1)`.
    pub fn with_backend(
        min_overlap: f64,
        high_latitude_state: &str,
        backend: Box<dyn OverlayBackend>,
    ) -> Result<Self, CrosswalkError> {
        if !(0.0..1.0).contains(&min_overlap) {
            return Err(CrosswalkError::Config {
                message: format!("min_overlap must be in [0, 1), got {min_overlap}"),
            });
        }
        Ok(Self {
            min_overlap,
            high_latitude_state: high_latitude_state.to_string(),
            backend,
        })
    }

    /// Overlays one region and accumulates its raw overlaps into `raw`.
    ///
    /// Returns `false` if the overlay failed; nothing is accumulated then.
    fn overlay_region(
        &self,
        region: &str,
        crs: EqualAreaCrs,
        boundaries: &[&BoundaryFeature],
        counties: &[&CountyFeature],
        raw: &mut RawOverlaps,
    ) -> bool {
        if boundaries.is_empty() || counties.is_empty() {
            log::info!(
                "Region {region}: {} boundaries, {} counties; nothing to overlay",
                boundaries.len(),
                counties.len()
            );
            return true;
        }

        let left: Vec<_> = boundaries.iter().map(|b| &b.geometry).collect();
        let right: Vec<_> = counties.iter().map(|c| &c.geometry).collect();
        let result = match overlay_pairs(self.backend.as_ref(), &left, &right, crs) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Region {region} ({}) overlay failed, skipping: {e}", crs.epsg());
                return false;
            }
        };

        // Features sharing a boundary id are parts of one boundary.
        let mut boundary_area: BTreeMap<&str, f64> = BTreeMap::new();
        for (feature, area) in boundaries.iter().zip(&result.left_areas_sqkm) {
            *boundary_area.entry(feature.boundary_id.as_str()).or_insert(0.0) += area;
        }

        let mut overlap_area: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        for overlap in &result.overlaps {
            let key = (
                boundaries[overlap.left].boundary_id.as_str(),
                counties[overlap.right].county_code.as_str(),
            );
            *overlap_area.entry(key).or_insert(0.0) += overlap.area_sqkm;
        }

        for ((boundary_id, county_code), area_sqkm) in overlap_area {
            let total = boundary_area.get(boundary_id).copied().unwrap_or(0.0);
            if total <= 0.0 {
                log::warn!("Boundary {boundary_id} has zero projected area; skipping");
                continue;
            }
            raw.entry(boundary_id.to_string())
                .or_default()
                .insert(county_code.to_string(), OverlapShare {
                    area_sqkm,
                    fraction: (area_sqkm / total).min(1.0),
                });
        }

        true
    }

    /// Builds the crosswalk artifact for the given polygon layers.
    #[must_use]
    pub fn build(
        &self,
        boundaries: &[BoundaryFeature],
        counties: &[CountyFeature],
        progress: &Arc<dyn ProgressCallback>,
    ) -> CrosswalkArtifact {
        let regions = [
            (HIGH_LATITUDE_REGION, EqualAreaCrs::AlaskaAlbers, true),
            (OTHER_REGION, EqualAreaCrs::ConusAlbers, false),
        ];
        progress.set_total(regions.len() as u64);

        let mut raw = RawOverlaps::new();
        let mut stats = BTreeMap::new();
        let mut projections = Vec::new();

        for (region, crs, high_latitude) in regions {
            progress.set_message(format!("Overlaying {region} ({})", crs.epsg()));
            let in_region = |state: &str| (state == self.high_latitude_state) == high_latitude;
            let region_boundaries: Vec<&BoundaryFeature> =
                boundaries.iter().filter(|b| in_region(&b.state_fips)).collect();
            let region_counties: Vec<&CountyFeature> =
                counties.iter().filter(|c| in_region(&c.state_fips)).collect();

            let ids: BTreeSet<&str> = region_boundaries
                .iter()
                .map(|b| b.boundary_id.as_str())
                .collect();
            let ok = self.overlay_region(region, crs, &region_boundaries, &region_counties, &mut raw);
            if ok && !region_boundaries.is_empty() && !region_counties.is_empty() {
                projections.push(crs.epsg().to_string());
            }

            stats.insert(region.to_string(), RegionStats {
                projection: crs.epsg().to_string(),
                boundaries: ids.len(),
                counties: region_counties.len(),
                links: 0,
                skipped: !ok,
            });
            progress.inc(1);
        }

        let normalized = filter_and_normalize(&raw, self.min_overlap);

        for (boundary_id, links) in &normalized.links {
            let region = if boundaries
                .iter()
                .any(|b| &b.boundary_id == boundary_id && b.state_fips == self.high_latitude_state)
            {
                HIGH_LATITUDE_REGION
            } else {
                OTHER_REGION
            };
            if let Some(s) = stats.get_mut(region) {
                s.links += links.len();
            }
        }

        let county_count = normalized
            .links
            .values()
            .flatten()
            .map(|l| l.county_geoid.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let link_count = normalized.links.values().map(Vec::len).sum();

        log::info!(
            "Crosswalk: {} boundaries -> {county_count} counties via {link_count} links ({} slivers dropped)",
            normalized.links.len(),
            normalized.slivers_dropped
        );
        if !normalized.boundaries_without_links.is_empty() {
            log::warn!(
                "{} boundaries have no link at or above {}",
                normalized.boundaries_without_links.len(),
                self.min_overlap
            );
        }
        progress.finish(format!("{} boundaries weighted", normalized.links.len()));

        CrosswalkArtifact {
            metadata: CrosswalkMetadata {
                version: CROSSWALK_VERSION.to_string(),
                projections,
                min_overlap: self.min_overlap,
                boundary_count: normalized.links.len(),
                county_count,
                link_count,
                slivers_dropped: normalized.slivers_dropped,
                boundaries_without_links: normalized.boundaries_without_links,
                regions: stats,
                generated_at: chrono::Utc::now().to_rfc3339(),
            },
            crosswalk: normalized.links,
        }
    }
}

/// Loads both polygon layers, builds the crosswalk, and writes it to the
/// configured `county_weights` path.
///
/// # Errors
///
/// Returns [`CrosswalkError`] if either polygon layer is missing or
/// unreadable, the configuration is invalid, or the write fails.
pub fn run(
    config: &BuildConfig,
    mapping: &ColumnMapping,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CrosswalkArtifact, CrosswalkError> {
    let boundaries = load_boundaries(
        &config.paths.boundaries_geojson,
        mapping,
        &config.crosswalk.high_latitude_state,
    )?;
    let counties = load_counties(&config.paths.counties_geojson, mapping)?;

    let builder = CrosswalkBuilder::new(
        config.crosswalk.min_overlap,
        &config.crosswalk.high_latitude_state,
    )?;
    let artifact = builder.build(&boundaries, &counties, progress);

    tribal_risk_geography::atomic::write_json(&config.paths.county_weights, &artifact)?;
    log::info!("Wrote crosswalk to {}", config.paths.county_weights.display());
    Ok(artifact)
}
