//! Connecticut county identifier vintages.
//!
//! In 2022 the Census Bureau replaced Connecticut's eight legacy counties
//! (`09001`..`09015`) with nine planning regions (`09110`..`09190`) as
//! county-equivalents. Source tables and boundary crosswalks built from
//! different vintages therefore key the same geography differently.
//!
//! The two schemes do not nest, so each code maps to a single primary
//! counterpart: the unit in the other scheme sharing the largest area.

use serde::{Deserialize, Serialize};

/// Which Connecticut numbering scheme a set of county codes uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountyVintage {
    /// Pre-2022 counties (`09001`..`09015`).
    Legacy,
    /// 2022+ planning regions (`09110`..`09190`).
    PlanningRegion,
}

/// Legacy county -> primary planning region.
pub const LEGACY_TO_PLANNING: &[(&str, &str)] = &[
    ("09001", "09190"), // Fairfield -> Western Connecticut
    ("09003", "09110"), // Hartford -> Capitol
    ("09005", "09160"), // Litchfield -> Northwest Hills
    ("09007", "09130"), // Middlesex -> Lower Connecticut River Valley
    ("09009", "09170"), // New Haven -> South Central Connecticut
    ("09011", "09180"), // New London -> Southeastern Connecticut
    ("09013", "09110"), // Tolland -> Capitol
    ("09015", "09150"), // Windham -> Northeastern Connecticut
];

/// Planning region -> primary legacy county.
pub const PLANNING_TO_LEGACY: &[(&str, &str)] = &[
    ("09110", "09003"), // Capitol -> Hartford
    ("09120", "09001"), // Greater Bridgeport -> Fairfield
    ("09130", "09007"), // Lower Connecticut River Valley -> Middlesex
    ("09140", "09009"), // Naugatuck Valley -> New Haven
    ("09150", "09015"), // Northeastern Connecticut -> Windham
    ("09160", "09005"), // Northwest Hills -> Litchfield
    ("09170", "09009"), // South Central Connecticut -> New Haven
    ("09180", "09011"), // Southeastern Connecticut -> New London
    ("09190", "09001"), // Western Connecticut -> Fairfield
];

impl CountyVintage {
    /// Classifies a single county code, or `None` if it is not a
    /// Connecticut code from either scheme.
    #[must_use]
    pub fn of(county_code: &str) -> Option<Self> {
        if LEGACY_TO_PLANNING.iter().any(|(c, _)| *c == county_code) {
            Some(Self::Legacy)
        } else if PLANNING_TO_LEGACY.iter().any(|(c, _)| *c == county_code) {
            Some(Self::PlanningRegion)
        } else {
            None
        }
    }

    /// Detects the vintage used by a set of codes.
    ///
    /// Returns `None` when no Connecticut codes are present or when both
    /// schemes appear (ambiguous; nothing is remapped).
    pub fn detect<'a>(codes: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut legacy = false;
        let mut planning = false;
        for code in codes {
            match Self::of(code) {
                Some(Self::Legacy) => legacy = true,
                Some(Self::PlanningRegion) => planning = true,
                None => {}
            }
        }
        match (legacy, planning) {
            (true, false) => Some(Self::Legacy),
            (false, true) => Some(Self::PlanningRegion),
            _ => None,
        }
    }

    /// All codes in this scheme paired with their primary counterpart in
    /// the other scheme.
    #[must_use]
    pub const fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Legacy => LEGACY_TO_PLANNING,
            Self::PlanningRegion => PLANNING_TO_LEGACY,
        }
    }
}
