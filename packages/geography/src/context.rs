//! Read-only lookup tables shared by every builder in one run.

use std::collections::BTreeSet;

use tribal_risk_geography_models::GeographicEntity;
use tribal_risk_geography_models::config::{BuildConfig, ColumnMapping};
use tribal_risk_geography_models::vintage::CountyVintage;

use crate::GeoError;
use crate::resolve::{
    BoundaryCounties, BoundaryToEntity, BoundaryWeights, EntityToBoundaries, load_crosswalk,
    load_registry, load_relationship, load_weights,
};
use crate::weighting::{CountyResolution, resolve_counties};

/// Everything needed to resolve an entity to weighted counties, loaded
/// once per build and passed to each builder.
#[derive(Debug, Clone, Default)]
pub struct GeoContext {
    /// Registry entities, sorted by id.
    pub entities: Vec<GeographicEntity>,
    /// `boundary_id -> entity_id`.
    pub boundary_to_entity: BoundaryToEntity,
    /// `entity_id -> [boundary_id]`.
    pub entity_boundaries: EntityToBoundaries,
    /// `boundary_id -> weighted county links`.
    pub weights: BoundaryWeights,
    /// `boundary_id -> [county_code]` for fallback tier 2.
    pub relationship: BoundaryCounties,
}

impl GeoContext {
    /// Loads the registry, boundary crosswalk, weight table, and
    /// relationship file named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the registry is missing or any present file
    /// is malformed.
    pub fn load(config: &BuildConfig, mapping: &ColumnMapping) -> Result<Self, GeoError> {
        let entities = load_registry(&config.paths.registry)?;
        let (boundary_to_entity, entity_boundaries) =
            load_crosswalk(&config.paths.boundary_crosswalk)?;
        let weights = load_weights(&config.paths.county_weights)?;
        let relationship = load_relationship(&config.paths.relationship_file, mapping)?;

        let unknown = entity_boundaries
            .keys()
            .filter(|id| {
                entities
                    .binary_search_by(|e| e.entity_id.as_str().cmp(id.as_str()))
                    .is_err()
            })
            .count();
        if unknown > 0 {
            log::warn!("{unknown} entities in the boundary crosswalk are not in the registry");
        }

        Ok(Self {
            entities,
            boundary_to_entity,
            entity_boundaries,
            weights,
            relationship,
        })
    }

    /// Boundary ids linked to `entity_id`.
    #[must_use]
    pub fn boundaries_of(&self, entity_id: &str) -> &[String] {
        self.entity_boundaries
            .get(entity_id)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Connecticut numbering used by the weight table and relationship
    /// file, if determinable.
    #[must_use]
    pub fn county_vintage(&self) -> Option<CountyVintage> {
        let weighted = self
            .weights
            .values()
            .flatten()
            .map(|w| w.county_geoid.as_str());
        let related = self.relationship.values().flatten().map(String::as_str);
        CountyVintage::detect(weighted.chain(related))
    }

    /// Resolves `entity` against the counties in `available`.
    #[must_use]
    pub fn resolve(
        &self,
        entity: &GeographicEntity,
        available: &BTreeSet<String>,
    ) -> CountyResolution {
        resolve_counties(
            entity,
            self.boundaries_of(&entity.entity_id),
            &self.weights,
            &self.relationship,
            available,
        )
    }
}
