#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Social vulnerability themes and the per-entity vulnerability profile.
//!
//! The CDC/ATSDR Social Vulnerability Index publishes four theme
//! percentiles per county. The composite here is the mean of themes 1, 2
//! and 4 only; theme 3 (racial and ethnic minority status) is left out of
//! the composite deliberately and is never reported.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use tribal_risk_geography_models::MatchMethod;

/// Data-gap tag for entities with less than half their weight covered.
pub const GAP_MISSING: &str = "missing";

/// Data-gap tag for partially covered entities in the high-latitude
/// state, whose source data is structurally sparser.
pub const GAP_ALASKA_PARTIAL: &str = "alaska_partial_coverage";

/// Coverage below which [`GAP_MISSING`] is attached.
pub const MISSING_COVERAGE_THRESHOLD: f64 = 0.5;

/// Tolerance for the composite-equals-mean check.
const COMPOSITE_TOLERANCE: f64 = 1e-9;

/// One of the four published SVI themes.
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
pub enum SviTheme {
    /// Theme 1.
    SocioeconomicStatus = 1,
    /// Theme 2.
    HouseholdCharacteristics = 2,
    /// Theme 3; excluded from the composite.
    RacialEthnicMinorityStatus = 3,
    /// Theme 4.
    HousingTypeTransportation = 4,
}

impl SviTheme {
    /// Themes that enter the composite, in report order.
    pub const INCLUDED: [Self; 3] = [
        Self::SocioeconomicStatus,
        Self::HouseholdCharacteristics,
        Self::HousingTypeTransportation,
    ];

    /// Published theme number (1-4).
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Published theme name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SocioeconomicStatus => "Socioeconomic Status",
            Self::HouseholdCharacteristics => "Household Characteristics",
            Self::RacialEthnicMinorityStatus => "Racial & Ethnic Minority Status",
            Self::HousingTypeTransportation => "Housing Type & Transportation",
        }
    }
}

/// One reported theme in a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeScore {
    /// Published theme number.
    pub theme_id: u8,
    /// Published theme name.
    pub name: String,
    /// Area-weighted theme percentile in `[0, 1]`.
    pub percentile: f64,
    /// Area-weighted flag count, rounded to the nearest integer.
    pub flag_count: u32,
}

/// Per-entity vulnerability profile artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityProfile {
    pub entity_id: String,
    pub entity_name: String,
    /// Exactly the three included themes, in [`SviTheme::INCLUDED`] order.
    pub themes: Vec<ThemeScore>,
    /// Arithmetic mean of the reported theme percentiles.
    pub composite: f64,
    /// Matched share of the linked county weight, in `[0, 1]`.
    pub coverage_pct: f64,
    /// Informative counties that contributed.
    pub counties_matched: usize,
    pub match_method: MatchMethod,
    /// SVI release year.
    pub source_year: u16,
    /// Data-gap tags, e.g. [`GAP_MISSING`].
    pub data_gaps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub generated_at: String,
}

/// Reason a [`VulnerabilityProfile`] failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileValidationError {
    /// The theme list is not exactly the included themes in order.
    #[error("expected themes [1, 2, 4], found {found:?}")]
    Themes {
        /// Theme ids found.
        found: Vec<u8>,
    },
    /// A percentile, composite, or coverage lies outside `[0, 1]`.
    #[error("{field} = {value} is outside [0, 1]")]
    OutOfRange {
        /// Which field.
        field: String,
        /// Offending value.
        value: f64,
    },
    /// The composite does not equal the mean of the themes.
    #[error("composite {composite} is not the theme mean {mean}")]
    CompositeMismatch {
        /// Stored composite.
        composite: f64,
        /// Mean of the reported themes.
        mean: f64,
    },
    /// Coverage is below the threshold but the missing tag is absent.
    #[error("coverage {coverage} requires the \"{}\" data gap", GAP_MISSING)]
    MissingGapTag {
        /// Stored coverage.
        coverage: f64,
    },
}

fn in_unit_range(field: &str, value: f64) -> Result<(), ProfileValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ProfileValidationError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

/// Mean of the theme percentiles; `0.0` for an empty list.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn theme_mean(themes: &[ThemeScore]) -> f64 {
    if themes.is_empty() {
        return 0.0;
    }
    themes.iter().map(|t| t.percentile).sum::<f64>() / themes.len() as f64
}

impl VulnerabilityProfile {
    /// Checks the profile's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProfileValidationError`] found.
    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        let found: Vec<u8> = self.themes.iter().map(|t| t.theme_id).collect();
        let expected: Vec<u8> = SviTheme::INCLUDED.iter().map(|t| t.id()).collect();
        if found != expected {
            return Err(ProfileValidationError::Themes { found });
        }
        for theme in &self.themes {
            in_unit_range(&format!("theme {} percentile", theme.theme_id), theme.percentile)?;
        }
        in_unit_range("composite", self.composite)?;
        in_unit_range("coverage_pct", self.coverage_pct)?;

        let mean = theme_mean(&self.themes);
        if (self.composite - mean).abs() > COMPOSITE_TOLERANCE {
            return Err(ProfileValidationError::CompositeMismatch {
                composite: self.composite,
                mean,
            });
        }
        if self.coverage_pct < MISSING_COVERAGE_THRESHOLD
            && !self.data_gaps.iter().any(|g| g == GAP_MISSING)
        {
            return Err(ProfileValidationError::MissingGapTag {
                coverage: self.coverage_pct,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(percentiles: [f64; 3], composite: f64) -> VulnerabilityProfile {
        VulnerabilityProfile {
            entity_id: "e1".to_string(),
            entity_name: "One".to_string(),
            themes: SviTheme::INCLUDED
                .iter()
                .zip(percentiles)
                .map(|(t, p)| ThemeScore {
                    theme_id: t.id(),
                    name: t.name().to_string(),
                    percentile: p,
                    flag_count: 0,
                })
                .collect(),
            composite,
            coverage_pct: 1.0,
            counties_matched: 1,
            match_method: MatchMethod::AreaWeighted,
            source_year: 2022,
            data_gaps: Vec::new(),
            note: None,
            generated_at: String::new(),
        }
    }

    #[test]
    fn included_themes_skip_theme_three() {
        let ids: Vec<u8> = SviTheme::INCLUDED.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn accepts_exact_mean() {
        assert!(profile([0.3, 0.6, 0.9], 0.6).validate().is_ok());
    }

    #[test]
    fn rejects_composite_mismatch() {
        assert!(matches!(
            profile([0.3, 0.6, 0.9], 0.5).validate(),
            Err(ProfileValidationError::CompositeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_percentile() {
        assert!(matches!(
            profile([1.3, 0.6, 0.9], 0.933_333_333_333_333_4).validate(),
            Err(ProfileValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_wrong_theme_set() {
        let mut p = profile([0.3, 0.6, 0.9], 0.6);
        p.themes[2].theme_id = 3;
        assert!(matches!(p.validate(), Err(ProfileValidationError::Themes { .. })));
    }

    #[test]
    fn low_coverage_requires_missing_tag() {
        let mut p = profile([0.3, 0.6, 0.9], 0.6);
        p.coverage_pct = 0.4;
        let err = p.validate().unwrap_err();
        assert_eq!(err, ProfileValidationError::MissingGapTag { coverage: 0.4 });
        assert_eq!(err.to_string(), "coverage 0.4 requires the \"missing\" data gap");
        p.data_gaps.push(GAP_MISSING.to_string());
        assert!(p.validate().is_ok());
    }
}
