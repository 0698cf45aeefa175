//! Typed loading of the county-level National Risk Index table.
//!
//! Column names are resolved once from the column mapping. Per-category
//! columns use `{code}` templates (`{code}_RISKS` becomes `WFIR_RISKS`),
//! resolved under field names like `WFIR.score`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tribal_risk_geography::GeoError;
use tribal_risk_geography::columns::{ColumnIndex, MissingColumn, open_csv};
use tribal_risk_geography_models::config::{ColumnMapping, tables};
use tribal_risk_geography_models::fips;
use tribal_risk_hazard_models::HazardCategory;

/// Scalar fields read from every row.
pub const FIELDS: &[&str] = &[
    "county_code",
    "state",
    "county_name",
    "risk_score",
    "risk_rating",
    "loss_total",
    "loss_structures",
    "loss_population",
    "loss_agriculture",
    "loss_population_equivalence",
    "resilience",
    "social_vulnerability",
];

/// Per-category logical fields and their suffix in resolved field names.
const CATEGORY_FIELDS: &[(&str, &str)] = &[
    ("category_score", "score"),
    ("category_rating", "rating"),
    ("category_loss", "loss"),
    ("category_frequency", "frequency"),
    ("category_events", "events"),
];

/// One category's values for one county.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryValues {
    /// Risk score (0-100).
    pub score: f64,
    /// Source rating label.
    pub rating: String,
    /// Expected annual loss in dollars.
    pub loss: f64,
    /// Annualized event frequency.
    pub frequency: f64,
    /// Recorded event count.
    pub events: f64,
}

/// One county row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountyHazardRecord {
    pub county_code: String,
    pub state: String,
    pub county_name: String,
    pub risk_score: f64,
    pub risk_rating: String,
    pub loss_total: f64,
    pub loss_structures: f64,
    pub loss_population: f64,
    pub loss_agriculture: f64,
    pub loss_population_equivalence: f64,
    pub resilience: f64,
    pub social_vulnerability: f64,
    /// Values per category; absent categories read as zero.
    pub categories: BTreeMap<HazardCategory, CategoryValues>,
}

static NO_VALUES: CategoryValues = CategoryValues {
    score: 0.0,
    rating: String::new(),
    loss: 0.0,
    frequency: 0.0,
    events: 0.0,
};

impl CountyHazardRecord {
    /// Values for `category`, zero if the table lacks it.
    #[must_use]
    pub fn category(&self, category: HazardCategory) -> &CategoryValues {
        self.categories.get(&category).unwrap_or(&NO_VALUES)
    }
}

/// The loaded table keyed by county code.
#[derive(Debug, Clone, Default)]
pub struct HazardTable {
    /// `county_code -> record`.
    pub rows: BTreeMap<String, CountyHazardRecord>,
    /// Rows skipped for an unreadable record or county code.
    pub skipped: usize,
    /// Fields with no matching column; they read as zero.
    pub missing: Vec<MissingColumn>,
}

impl HazardTable {
    /// County codes present in the table.
    #[must_use]
    pub fn county_codes(&self) -> BTreeSet<String> {
        self.rows.keys().cloned().collect()
    }

    /// Looks up one county.
    #[must_use]
    pub fn get(&self, county_code: &str) -> Option<&CountyHazardRecord> {
        self.rows.get(county_code)
    }

    /// Whether `field` resolved to a column.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        !self.missing.iter().any(|m| m.field == field)
    }
}

/// Resolved field name for one category column.
fn category_field(category: HazardCategory, suffix: &str) -> String {
    format!("{}.{suffix}", category.code())
}

/// Resolves every scalar and per-category field against `headers`.
fn resolve_columns(headers: &csv::StringRecord, mapping: &ColumnMapping) -> ColumnIndex {
    let mut columns = ColumnIndex::new(headers.iter());
    columns.resolve_all(mapping, tables::HAZARD, FIELDS);

    for (field, suffix) in CATEGORY_FIELDS {
        let templates = mapping.candidates(tables::HAZARD, field);
        for category in HazardCategory::ALL {
            let candidates: Vec<String> = templates
                .iter()
                .map(|t| t.replace("{code}", category.code()))
                .collect();
            columns.resolve(&category_field(category, suffix), &candidates);
        }
    }
    columns
}

/// Reads one record into a typed row. Returns `None` if the county code
/// is unusable.
fn read_record(columns: &ColumnIndex, record: &csv::StringRecord) -> Option<CountyHazardRecord> {
    let county_code = columns
        .text(record, "county_code")
        .and_then(fips::normalize_county_code)?;
    let text = |field: &str| columns.text(record, field).unwrap_or_default().to_string();

    let categories = HazardCategory::ALL
        .iter()
        .map(|c| {
            (*c, CategoryValues {
                score: columns.number(record, &category_field(*c, "score")),
                rating: text(&category_field(*c, "rating")),
                loss: columns.number(record, &category_field(*c, "loss")),
                frequency: columns.number(record, &category_field(*c, "frequency")),
                events: columns.number(record, &category_field(*c, "events")),
            })
        })
        .collect();

    Some(CountyHazardRecord {
        county_code,
        state: text("state"),
        county_name: text("county_name"),
        risk_score: columns.number(record, "risk_score"),
        risk_rating: text("risk_rating"),
        loss_total: columns.number(record, "loss_total"),
        loss_structures: columns.number(record, "loss_structures"),
        loss_population: columns.number(record, "loss_population"),
        loss_agriculture: columns.number(record, "loss_agriculture"),
        loss_population_equivalence: columns.number(record, "loss_population_equivalence"),
        resilience: columns.number(record, "resilience"),
        social_vulnerability: columns.number(record, "social_vulnerability"),
        categories,
    })
}

/// Loads the county hazard table.
///
/// Empty or non-numeric cells read as zero. Rows with an unparseable
/// county code are skipped and counted. A missing file yields an empty
/// table with a warning, so every entity degrades to a zero profile.
///
/// # Errors
///
/// Returns [`GeoError::MissingColumn`] if no county code column is found,
/// or [`GeoError::Csv`] if the header row cannot be read.
pub fn load_hazard_table(path: &Path, mapping: &ColumnMapping) -> Result<HazardTable, GeoError> {
    if !path.exists() {
        log::warn!(
            "Hazard table not found at {}; all hazard values will be zero",
            path.display()
        );
        return Ok(HazardTable::default());
    }

    let mut reader = open_csv(path)?;
    let columns = resolve_columns(reader.headers()?, mapping);
    columns.require("county_code")?;

    let mut table = HazardTable {
        missing: columns.missing().to_vec(),
        ..HazardTable::default()
    };

    for record in reader.records() {
        let Some(row) = record.ok().and_then(|r| read_record(&columns, &r)) else {
            table.skipped += 1;
            continue;
        };
        if table.rows.contains_key(&row.county_code) {
            log::debug!("Duplicate county {} in hazard table; keeping last", row.county_code);
        }
        table.rows.insert(row.county_code.clone(), row);
    }

    if table.skipped > 0 {
        log::warn!(
            "Skipped {} malformed rows in hazard table {}",
            table.skipped,
            path.display()
        );
    }
    if !table.missing.is_empty() {
        log::debug!("{} hazard fields unresolved", table.missing.len());
    }
    log::info!(
        "Loaded {} counties from hazard table {}",
        table.rows.len(),
        path.display()
    );
    Ok(table)
}
