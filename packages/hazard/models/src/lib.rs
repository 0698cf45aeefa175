#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hazard category taxonomy and per-entity hazard profile types.
//!
//! The National Risk Index publishes the same 18 hazard categories for
//! every county, each keyed by a four-letter code used as a column
//! prefix in the source table (`WFIR_RISKS`, `WFIR_EALT`, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tribal_risk_geography_models::MatchMethod;

/// Number of hazard categories every profile carries.
pub const CATEGORY_COUNT: usize = 18;

/// Maximum number of entries in a profile's top-category list.
pub const TOP_CATEGORY_LIMIT: usize = 5;

/// Data source tag for the independent wildfire override.
pub const WILDFIRE_DATA_SOURCE: &str = "usfs_wildfire_risk";

/// One National Risk Index hazard category.
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
pub enum HazardCategory {
    #[serde(rename = "AVLN")]
    #[strum(serialize = "AVLN")]
    Avalanche,
    #[serde(rename = "CFLD")]
    #[strum(serialize = "CFLD")]
    CoastalFlooding,
    #[serde(rename = "CWAV")]
    #[strum(serialize = "CWAV")]
    ColdWave,
    #[serde(rename = "DRGT")]
    #[strum(serialize = "DRGT")]
    Drought,
    #[serde(rename = "ERQK")]
    #[strum(serialize = "ERQK")]
    Earthquake,
    #[serde(rename = "HAIL")]
    #[strum(serialize = "HAIL")]
    Hail,
    #[serde(rename = "HWAV")]
    #[strum(serialize = "HWAV")]
    HeatWave,
    #[serde(rename = "HRCN")]
    #[strum(serialize = "HRCN")]
    Hurricane,
    #[serde(rename = "ISTM")]
    #[strum(serialize = "ISTM")]
    IceStorm,
    #[serde(rename = "LNDS")]
    #[strum(serialize = "LNDS")]
    Landslide,
    #[serde(rename = "LTNG")]
    #[strum(serialize = "LTNG")]
    Lightning,
    #[serde(rename = "RFLD")]
    #[strum(serialize = "RFLD")]
    RiverineFlooding,
    #[serde(rename = "SWND")]
    #[strum(serialize = "SWND")]
    StrongWind,
    #[serde(rename = "TRND")]
    #[strum(serialize = "TRND")]
    Tornado,
    #[serde(rename = "TSUN")]
    #[strum(serialize = "TSUN")]
    Tsunami,
    #[serde(rename = "VLCN")]
    #[strum(serialize = "VLCN")]
    VolcanicActivity,
    #[serde(rename = "WFIR")]
    #[strum(serialize = "WFIR")]
    Wildfire,
    #[serde(rename = "WNTW")]
    #[strum(serialize = "WNTW")]
    WinterWeather,
}

impl HazardCategory {
    /// Every category, in code order.
    pub const ALL: [Self; CATEGORY_COUNT] = [
        Self::Avalanche,
        Self::CoastalFlooding,
        Self::ColdWave,
        Self::Drought,
        Self::Earthquake,
        Self::Hail,
        Self::HeatWave,
        Self::Hurricane,
        Self::IceStorm,
        Self::Landslide,
        Self::Lightning,
        Self::RiverineFlooding,
        Self::StrongWind,
        Self::Tornado,
        Self::Tsunami,
        Self::VolcanicActivity,
        Self::Wildfire,
        Self::WinterWeather,
    ];

    /// Four-letter source-table code, e.g. `"WFIR"`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Avalanche => "AVLN",
            Self::CoastalFlooding => "CFLD",
            Self::ColdWave => "CWAV",
            Self::Drought => "DRGT",
            Self::Earthquake => "ERQK",
            Self::Hail => "HAIL",
            Self::HeatWave => "HWAV",
            Self::Hurricane => "HRCN",
            Self::IceStorm => "ISTM",
            Self::Landslide => "LNDS",
            Self::Lightning => "LTNG",
            Self::RiverineFlooding => "RFLD",
            Self::StrongWind => "SWND",
            Self::Tornado => "TRND",
            Self::Tsunami => "TSUN",
            Self::VolcanicActivity => "VLCN",
            Self::Wildfire => "WFIR",
            Self::WinterWeather => "WNTW",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Avalanche => "Avalanche",
            Self::CoastalFlooding => "Coastal Flooding",
            Self::ColdWave => "Cold Wave",
            Self::Drought => "Drought",
            Self::Earthquake => "Earthquake",
            Self::Hail => "Hail",
            Self::HeatWave => "Heat Wave",
            Self::Hurricane => "Hurricane",
            Self::IceStorm => "Ice Storm",
            Self::Landslide => "Landslide",
            Self::Lightning => "Lightning",
            Self::RiverineFlooding => "Riverine Flooding",
            Self::StrongWind => "Strong Wind",
            Self::Tornado => "Tornado",
            Self::Tsunami => "Tsunami",
            Self::VolcanicActivity => "Volcanic Activity",
            Self::Wildfire => "Wildfire",
            Self::WinterWeather => "Winter Weather",
        }
    }
}

/// Categorical rating tier for a 0-100 risk score.
///
/// Tiers use fixed quintile breakpoints. The published index derives some
/// of its ratings with k-means clustering instead, so these labels are an
/// approximation and may differ from the official rating near a
/// breakpoint.
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
pub enum RiskRating {
    #[serde(rename = "Very Low")]
    #[strum(serialize = "Very Low")]
    VeryLow,
    #[serde(rename = "Relatively Low")]
    #[strum(serialize = "Relatively Low")]
    RelativelyLow,
    #[serde(rename = "Relatively Moderate")]
    #[strum(serialize = "Relatively Moderate")]
    RelativelyModerate,
    #[serde(rename = "Relatively High")]
    #[strum(serialize = "Relatively High")]
    RelativelyHigh,
    #[serde(rename = "Very High")]
    #[strum(serialize = "Very High")]
    VeryHigh,
}

impl RiskRating {
    /// Tier for `score`, `None` for a zero (or negative) score.
    #[must_use]
    pub fn from_score(score: f64) -> Option<Self> {
        if score <= 0.0 || score.is_nan() {
            return None;
        }
        Some(if score >= 80.0 {
            Self::VeryHigh
        } else if score >= 60.0 {
            Self::RelativelyHigh
        } else if score >= 40.0 {
            Self::RelativelyModerate
        } else if score >= 20.0 {
            Self::RelativelyLow
        } else {
            Self::VeryLow
        })
    }

    /// Rating label for `score`; empty for a zero score.
    #[must_use]
    pub fn label(score: f64) -> String {
        Self::from_score(score).map(|r| r.to_string()).unwrap_or_default()
    }
}

/// Entity-level composite risk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeRisk {
    /// Area-weighted composite risk score (0-100).
    pub score: f64,
    /// Rating label derived from `score`.
    pub rating: String,
    /// Area-weighted expected annual loss in dollars.
    pub loss_total: f64,
    /// Area-weighted community resilience score.
    pub community_resilience: f64,
    /// Area-weighted social vulnerability score.
    pub social_vulnerability: f64,
}

/// One category slot in `all_categories`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    /// Area-weighted category score (0-100).
    pub score: f64,
    /// Rating label; empty when `score` is zero.
    pub rating: String,
    /// Area-weighted expected annual loss in dollars.
    pub loss_total: f64,
    /// Area-weighted annualized event frequency.
    pub annualized_frequency: f64,
    /// Area-weighted recorded event count.
    pub event_count: f64,
    /// Set when the score came from an independent dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// The source table's score, kept when `score` was overridden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nri_score: Option<f64>,
}

/// One entry of the ranked top-category list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCategory {
    /// Category name.
    pub name: String,
    /// Four-letter code.
    pub code: String,
    /// Category score.
    pub score: f64,
    /// Rating label.
    pub rating: String,
    /// Expected annual loss in dollars.
    pub loss_total: f64,
}

/// Per-entity hazard profile artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardProfile {
    /// Entity identifier.
    pub entity_id: String,
    /// Entity display name.
    pub entity_name: String,
    /// Source dataset version label.
    pub dataset_version: String,
    /// Counties that contributed to the aggregate.
    pub counties_analyzed: usize,
    /// Fallback tier that produced the county set.
    pub match_method: MatchMethod,
    /// Matched share of the linked county weight, in `[0, 1]`.
    pub coverage: f64,
    /// Composite risk.
    pub composite: CompositeRisk,
    /// Up to five highest-scoring non-zero categories.
    pub top_categories: Vec<TopCategory>,
    /// Every category keyed by code; always exactly 18 entries.
    pub all_categories: BTreeMap<String, CategoryProfile>,
    /// Explanation attached when nothing could be matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// RFC 3339 build timestamp.
    pub generated_at: String,
}

impl HazardProfile {
    /// Re-derives `top_categories` from `all_categories`.
    ///
    /// Categories are ranked by descending score; equal scores keep
    /// category code order. Zero-score categories are never listed.
    pub fn rank_top_categories(&mut self) {
        let mut ranked: Vec<(HazardCategory, &CategoryProfile)> = HazardCategory::ALL
            .iter()
            .filter_map(|c| self.all_categories.get(c.code()).map(|p| (*c, p)))
            .filter(|(_, p)| p.score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

        self.top_categories = ranked
            .into_iter()
            .take(TOP_CATEGORY_LIMIT)
            .map(|(category, p)| TopCategory {
                name: category.name().to_string(),
                code: category.code().to_string(),
                score: p.score,
                rating: p.rating.clone(),
                loss_total: p.loss_total,
            })
            .collect();
    }
}
