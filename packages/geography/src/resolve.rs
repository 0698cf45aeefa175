//! Loaders for the registry, boundary -> entity mapping, county weight
//! table, and boundary -> county relationship file.
//!
//! Everything except the registry is optional: a missing file logs a
//! warning and yields an empty mapping so dependent entities degrade to
//! the next fallback tier instead of aborting the build.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tribal_risk_geography_models::config::{ColumnMapping, tables};
use tribal_risk_geography_models::fips;
use tribal_risk_geography_models::{
    BoundaryEntityFile, CountyWeight, CrosswalkArtifact, GeographicEntity,
};

use crate::GeoError;
use crate::columns::{ColumnIndex, open_csv};

/// `boundary_id -> entity_id`.
pub type BoundaryToEntity = BTreeMap<String, String>;

/// `entity_id -> [boundary_id]`, sorted and deduplicated.
pub type EntityToBoundaries = BTreeMap<String, Vec<String>>;

/// `boundary_id -> weighted county links`.
pub type BoundaryWeights = BTreeMap<String, Vec<CountyWeight>>;

/// `boundary_id -> [county_code]`, sorted and deduplicated.
pub type BoundaryCounties = BTreeMap<String, Vec<String>>;

/// Loads the entity registry.
///
/// # Errors
///
/// Returns [`GeoError::MissingInput`] if the registry does not exist, or
/// a parse error if it is malformed.
pub fn load_registry(path: &Path) -> Result<Vec<GeographicEntity>, GeoError> {
    if !path.exists() {
        return Err(GeoError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let mut entities: Vec<GeographicEntity> = serde_json::from_str(&contents)?;
    entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

    let before = entities.len();
    entities.dedup_by(|a, b| a.entity_id == b.entity_id);
    if entities.len() != before {
        log::warn!(
            "Registry {} has {} duplicate entity ids; keeping the first of each",
            path.display(),
            before - entities.len()
        );
    }

    log::info!("Loaded {} entities from {}", entities.len(), path.display());
    Ok(entities)
}

/// Loads the boundary -> entity mapping and its inverse.
///
/// One entity commonly spans several boundaries, so the inverse maps each
/// entity to every boundary id linked to it.
///
/// # Errors
///
/// Returns [`GeoError`] if the file exists but cannot be read or parsed.
pub fn load_crosswalk(path: &Path) -> Result<(BoundaryToEntity, EntityToBoundaries), GeoError> {
    if !path.exists() {
        log::warn!(
            "Boundary crosswalk {} not found; no entity has linked boundaries",
            path.display()
        );
        return Ok((BTreeMap::new(), BTreeMap::new()));
    }
    let contents = std::fs::read_to_string(path)?;
    let file: BoundaryEntityFile = serde_json::from_str(&contents)?;
    let inverse = invert(&file.mappings);

    log::info!(
        "Loaded {} boundary links for {} entities from {}",
        file.mappings.len(),
        inverse.len(),
        path.display()
    );
    Ok((file.mappings, inverse))
}

/// Inverts `boundary -> entity` into `entity -> [boundary]`.
#[must_use]
pub fn invert(forward: &BoundaryToEntity) -> EntityToBoundaries {
    let mut inverse: EntityToBoundaries = BTreeMap::new();
    for (boundary_id, entity_id) in forward {
        inverse
            .entry(entity_id.clone())
            .or_default()
            .push(boundary_id.clone());
    }
    for boundaries in inverse.values_mut() {
        boundaries.sort();
        boundaries.dedup();
    }
    inverse
}

/// Loads the boundary -> county weight table written by the crosswalk
/// builder.
///
/// Returns an empty mapping (with a warning) if the file is absent;
/// callers then fall back to equal weighting.
///
/// # Errors
///
/// Returns [`GeoError`] if the file exists but cannot be read or parsed.
pub fn load_weights(path: &Path) -> Result<BoundaryWeights, GeoError> {
    if !path.exists() {
        log::warn!(
            "County weight table {} not found; falling back to equal weighting",
            path.display()
        );
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)?;
    let artifact: CrosswalkArtifact = serde_json::from_str(&contents)?;
    log::info!(
        "Loaded county weights for {} boundaries (min_overlap={}) from {}",
        artifact.crosswalk.len(),
        artifact.metadata.min_overlap,
        path.display()
    );
    Ok(artifact.crosswalk)
}

/// Loads the boundary -> county relationship file used by fallback
/// tier 2.
///
/// Rows without a usable boundary id or county code are skipped and
/// counted.
///
/// # Errors
///
/// Returns [`GeoError`] if the file exists but cannot be read, or lacks
/// a boundary id column.
pub fn load_relationship(path: &Path, mapping: &ColumnMapping) -> Result<BoundaryCounties, GeoError> {
    if !path.exists() {
        log::warn!("Relationship file {} not found", path.display());
        return Ok(BTreeMap::new());
    }

    let mut reader = open_csv(path)?;
    let mut columns = ColumnIndex::new(reader.headers()?.iter());
    columns.resolve_all(
        mapping,
        tables::RELATIONSHIP,
        &["boundary_id", "county_code", "state_fips", "county_fips"],
    );
    columns.require("boundary_id")?;

    let mut sets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };
        let boundary = columns.text(&record, "boundary_id");
        let county = columns
            .text(&record, "county_code")
            .and_then(fips::normalize_county_code)
            .or_else(|| {
                fips::county_code(
                    columns.text(&record, "state_fips")?,
                    columns.text(&record, "county_fips")?,
                )
            });

        match (boundary, county) {
            (Some(boundary), Some(county)) => {
                sets.entry(boundary.to_string()).or_default().insert(county);
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} malformed rows in relationship file {}",
            path.display()
        );
    }
    log::info!(
        "Loaded county relationships for {} boundaries from {}",
        sets.len(),
        path.display()
    );

    Ok(sets
        .into_iter()
        .map(|(k, v)| (k, v.into_iter().collect()))
        .collect())
}
