//! Entity -> weighted county resolution.
//!
//! Each builder turns an entity into a set of `(county_code, weight)`
//! pairs through three tiers, tried in order until one yields at least
//! one county present in the builder's source table:
//!
//! 1. area weights from the polygon crosswalk, summed per county across
//!    all of the entity's boundaries;
//! 2. equal weights over the boundary -> county relationship file;
//! 3. equal weights over every source-table county in the entity's
//!    states.
//!
//! Weights are then renormalized over only the counties present in the
//! source table, and coverage records the matched share of the linked
//! weight.

use std::collections::{BTreeMap, BTreeSet};

use tribal_risk_geography_models::{GeographicEntity, MatchMethod, fips};

use crate::resolve::{BoundaryCounties, BoundaryWeights};

/// An entity's resolved county weights.
#[derive(Debug, Clone, PartialEq)]
pub struct CountyResolution {
    /// Tier that produced the county set.
    pub method: MatchMethod,
    /// `(county_code, weight)` over present counties, sorted by code.
    /// Weights sum to 1.0 unless empty.
    pub weights: Vec<(String, f64)>,
    /// Counties linked by the winning tier, present or not.
    pub linked_counties: usize,
    /// Total raw weight of the linked counties.
    pub linked_weight: f64,
    /// Raw weight of the linked counties present in the source table.
    pub matched_weight: f64,
    /// `matched_weight / linked_weight` in `[0, 1]`; `0.0` when the
    /// renormalization denominator was zero.
    pub coverage: f64,
    /// Explanation attached to unmatched profiles.
    pub note: Option<String>,
}

impl CountyResolution {
    /// An empty resolution carrying an explanatory note.
    #[must_use]
    pub fn unmatched(note: impl Into<String>) -> Self {
        Self {
            method: MatchMethod::Unmatched,
            weights: Vec::new(),
            linked_counties: 0,
            linked_weight: 0.0,
            matched_weight: 0.0,
            coverage: 0.0,
            note: Some(note.into()),
        }
    }

    /// Whether at least one county was matched.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Number of counties contributing to the aggregate.
    #[must_use]
    pub fn counties_analyzed(&self) -> usize {
        self.weights.len()
    }

    /// Area-weighted mean of `value` over the resolved counties.
    pub fn weighted_mean(&self, mut value: impl FnMut(&str) -> f64) -> f64 {
        self.weights.iter().map(|(code, w)| w * value(code)).sum()
    }

    /// The resolved county codes.
    pub fn counties(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(code, _)| code.as_str())
    }

    /// Drops counties for which `keep` is false and renormalizes the rest.
    ///
    /// Dropped counties stay in `linked_weight`, so coverage falls by
    /// their share. When nothing is kept the resolution becomes unmatched
    /// with the note built by `note`.
    #[must_use]
    pub fn retain(
        mut self,
        mut keep: impl FnMut(&str) -> bool,
        note: impl FnOnce() -> String,
    ) -> Self {
        let before = self.weights.len();
        self.weights.retain(|(code, _)| keep(code));
        if self.weights.len() == before {
            return self;
        }
        if self.weights.is_empty() {
            return Self {
                linked_counties: self.linked_counties,
                linked_weight: self.linked_weight,
                ..Self::unmatched(note())
            };
        }

        let share: f64 = self.weights.iter().map(|(_, w)| w).sum();
        if share > 0.0 {
            for (_, w) in &mut self.weights {
                *w /= share;
            }
            self.matched_weight *= share;
            self.coverage = (self.coverage * share).clamp(0.0, 1.0);
        } else {
            #[allow(clippy::cast_precision_loss)]
            let equal = 1.0 / self.weights.len() as f64;
            for (_, w) in &mut self.weights {
                *w = equal;
            }
            self.matched_weight = 0.0;
            self.coverage = 0.0;
        }
        self
    }
}

/// Resolves `entity` to weighted counties.
///
/// `available` is the set of county codes usable by the calling builder
/// (present in its source table and, where the builder filters rows,
/// informative).
///
/// Entities with no linked boundaries are never resolved through the
/// state fallback: without a boundary there is no evidence of where in
/// the state the entity lies.
#[must_use]
pub fn resolve_counties(
    entity: &GeographicEntity,
    boundaries: &[String],
    weights: &BoundaryWeights,
    relationship: &BoundaryCounties,
    available: &BTreeSet<String>,
) -> CountyResolution {
    if boundaries.is_empty() {
        return CountyResolution::unmatched(format!(
            "No boundaries are linked to {} in the boundary crosswalk; all values are zero",
            entity.name
        ));
    }

    let mut area: BTreeMap<String, f64> = BTreeMap::new();
    for boundary in boundaries {
        for row in weights.get(boundary).into_iter().flatten() {
            *area.entry(row.county_geoid.clone()).or_insert(0.0) += row.weight;
        }
    }
    if let Some(resolution) = renormalize(MatchMethod::AreaWeighted, &area, available) {
        return resolution;
    }

    let related: BTreeMap<String, f64> = boundaries
        .iter()
        .filter_map(|b| relationship.get(b))
        .flatten()
        .map(|county| (county.clone(), 1.0))
        .collect();
    if let Some(resolution) = renormalize(MatchMethod::RelationshipFile, &related, available) {
        log::debug!(
            "{}: no area weights matched, using relationship file ({} counties)",
            entity.entity_id,
            resolution.linked_counties
        );
        return resolution;
    }

    let states = entity.state_fips();
    let in_state: BTreeMap<String, f64> = available
        .iter()
        .filter(|code| {
            fips::county_state(code).is_some_and(|s| states.iter().any(|st| *st == s))
        })
        .map(|code| (code.clone(), 1.0))
        .collect();
    if let Some(resolution) = renormalize(MatchMethod::StateFallback, &in_state, available) {
        log::debug!(
            "{}: falling back to {} counties in states {:?}",
            entity.entity_id,
            resolution.linked_counties,
            states
        );
        return resolution;
    }

    CountyResolution::unmatched(format!(
        "None of the counties linked to {} ({} boundaries, states {:?}) are present in the source table; all values are zero",
        entity.name,
        boundaries.len(),
        entity.states
    ))
}

/// Renormalizes `linked` weights over the counties in `available`.
///
/// Returns `None` when no linked county is available. When the available
/// counties carry zero total weight, falls back to equal weights and
/// records zero coverage.
#[must_use]
pub fn renormalize(
    method: MatchMethod,
    linked: &BTreeMap<String, f64>,
    available: &BTreeSet<String>,
) -> Option<CountyResolution> {
    let present: Vec<(&String, f64)> = linked
        .iter()
        .filter(|(code, _)| available.contains(*code))
        .map(|(code, w)| (code, *w))
        .collect();
    if present.is_empty() {
        return None;
    }

    let linked_weight: f64 = linked.values().sum();
    let matched_weight: f64 = present.iter().map(|(_, w)| w).sum();

    #[allow(clippy::cast_precision_loss)]
    let (weights, coverage) = if matched_weight > 0.0 {
        let weights = present
            .iter()
            .map(|(code, w)| ((*code).clone(), w / matched_weight))
            .collect();
        let coverage = if linked_weight > 0.0 {
            (matched_weight / linked_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (weights, coverage)
    } else {
        log::warn!(
            "Zero total weight over {} matched counties; using equal weights",
            present.len()
        );
        let equal = 1.0 / present.len() as f64;
        let weights = present
            .iter()
            .map(|(code, _)| ((*code).clone(), equal))
            .collect();
        (weights, 0.0)
    };

    Some(CountyResolution {
        method,
        weights,
        linked_counties: linked.len(),
        linked_weight,
        matched_weight,
        coverage,
        note: None,
    })
}

/// Rounds `value` to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use tribal_risk_geography_models::CountyWeight;

    use super::*;

    fn entity(states: &[&str]) -> GeographicEntity {
        GeographicEntity {
            entity_id: "e1".to_string(),
            name: "Entity One".to_string(),
            states: states.iter().map(ToString::to_string).collect(),
        }
    }

    fn link(county: &str, weight: f64) -> CountyWeight {
        CountyWeight {
            county_geoid: county.to_string(),
            overlap_area_sqkm: 1.0,
            weight,
        }
    }

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(ToString::to_string).collect()
    }

    fn boundaries(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn sums_shared_counties_across_boundaries() {
        let weights: BoundaryWeights = BTreeMap::from([
            ("b1".to_string(), vec![link("04001", 0.5), link("04005", 0.5)]),
            ("b2".to_string(), vec![link("04001", 1.0)]),
        ]);
        let r = resolve_counties(
            &entity(&["AZ"]),
            &boundaries(&["b1", "b2"]),
            &weights,
            &BTreeMap::new(),
            &set(&["04001", "04005"]),
        );
        assert_eq!(r.method, MatchMethod::AreaWeighted);
        assert_eq!(r.weights[0].0, "04001");
        assert!((r.weights[0].1 - 0.75).abs() < 1e-12);
        assert!((r.weights[1].1 - 0.25).abs() < 1e-12);
        assert!((r.coverage - 1.0).abs() < 1e-12);
    }

    #[test]
    fn renormalizes_over_present_counties() {
        let weights: BoundaryWeights = BTreeMap::from([(
            "b1".to_string(),
            vec![link("04001", 0.6), link("04005", 0.3), link("04007", 0.1)],
        )]);
        let r = resolve_counties(
            &entity(&["AZ"]),
            &boundaries(&["b1"]),
            &weights,
            &BTreeMap::new(),
            &set(&["04001", "04005"]),
        );
        assert_eq!(r.counties_analyzed(), 2);
        let total: f64 = r.weights.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((r.weights[0].1 - 0.6 / 0.9).abs() < 1e-12);
        assert!((r.coverage - 0.9).abs() < 1e-12);
        assert_eq!(r.linked_counties, 3);
    }

    #[test]
    fn falls_back_to_relationship_file() {
        let relationship: BoundaryCounties =
            BTreeMap::from([("b1".to_string(), vec!["04001".to_string(), "04009".to_string()])]);
        let r = resolve_counties(
            &entity(&["AZ"]),
            &boundaries(&["b1"]),
            &BTreeMap::new(),
            &relationship,
            &set(&["04001", "04009", "04011"]),
        );
        assert_eq!(r.method, MatchMethod::RelationshipFile);
        assert_eq!(r.counties().collect::<Vec<_>>(), vec!["04001", "04009"]);
        assert!((r.weights[0].1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn falls_back_to_state_counties() {
        let r = resolve_counties(
            &entity(&["NM"]),
            &boundaries(&["b1"]),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &set(&["04001", "35001", "35003"]),
        );
        assert_eq!(r.method, MatchMethod::StateFallback);
        assert_eq!(r.counties().collect::<Vec<_>>(), vec!["35001", "35003"]);
        assert!((r.coverage - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_tier_without_present_counties_falls_through() {
        let weights: BoundaryWeights =
            BTreeMap::from([("b1".to_string(), vec![link("04099", 1.0)])]);
        let r = resolve_counties(
            &entity(&["AZ"]),
            &boundaries(&["b1"]),
            &weights,
            &BTreeMap::new(),
            &set(&["04001"]),
        );
        assert_eq!(r.method, MatchMethod::StateFallback);
    }

    #[test]
    fn zero_weight_denominator_uses_equal_weights() {
        let linked = BTreeMap::from([("04001".to_string(), 0.0), ("04005".to_string(), 0.0)]);
        let r = renormalize(MatchMethod::AreaWeighted, &linked, &set(&["04001", "04005"])).unwrap();
        assert!((r.weights[0].1 - 0.5).abs() < 1e-12);
        assert!(r.coverage.abs() < f64::EPSILON);
    }

    #[test]
    fn no_boundaries_is_unmatched_with_note() {
        let r = resolve_counties(
            &entity(&["AZ"]),
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &set(&["04001"]),
        );
        assert_eq!(r.method, MatchMethod::Unmatched);
        assert!(!r.is_matched());
        assert!(r.note.as_deref().is_some_and(|n| !n.is_empty()));
    }

    #[test]
    fn weighted_mean_uses_weights() {
        let linked = BTreeMap::from([("a".to_string(), 3.0), ("b".to_string(), 1.0)]);
        let r = renormalize(MatchMethod::AreaWeighted, &linked, &set(&["a", "b"])).unwrap();
        let mean = r.weighted_mean(|code| if code == "a" { 10.0 } else { 50.0 });
        assert!((mean - 20.0).abs() < 1e-12);
    }

    #[test]
    fn retain_renormalizes_and_keeps_dropped_weight_linked() {
        let linked = BTreeMap::from([("a".to_string(), 0.3), ("b".to_string(), 0.7)]);
        let r = renormalize(MatchMethod::AreaWeighted, &linked, &set(&["a", "b"]))
            .unwrap()
            .retain(|code| code == "a", String::new);
        assert_eq!(r.method, MatchMethod::AreaWeighted);
        assert_eq!(r.counties().collect::<Vec<_>>(), vec!["a"]);
        assert!((r.weights[0].1 - 1.0).abs() < 1e-12);
        assert!((r.coverage - 0.3).abs() < 1e-12);
        assert!((r.linked_weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn retain_nothing_is_unmatched() {
        let linked = BTreeMap::from([("a".to_string(), 1.0)]);
        let r = renormalize(MatchMethod::AreaWeighted, &linked, &set(&["a"]))
            .unwrap()
            .retain(|_| false, || "suppressed".to_string());
        assert_eq!(r.method, MatchMethod::Unmatched);
        assert!(!r.is_matched());
        assert!(r.coverage.abs() < f64::EPSILON);
        assert_eq!(r.linked_counties, 1);
        assert_eq!(r.note.as_deref(), Some("suppressed"));
    }

    #[test]
    fn rounds() {
        assert!((round_to(0.984_848_48, 4) - 0.9848).abs() < 1e-12);
        assert!((round_to(12.345_67, 2) - 12.35).abs() < 1e-12);
    }
}
