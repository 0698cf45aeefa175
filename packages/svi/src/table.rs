//! County-level SVI table loading.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tribal_risk_geography::GeoError;
use tribal_risk_geography::columns::{ColumnIndex, open_csv};
use tribal_risk_geography_models::config::{ColumnMapping, tables};
use tribal_risk_geography_models::fips;
use tribal_risk_svi_models::SviTheme;

/// Values at or below this mark suppressed entries.
pub const SENTINEL: f64 = -999.0;

/// One county row. Theme arrays are indexed by theme number minus one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SviRecord {
    pub county_code: String,
    pub state: String,
    /// Theme percentiles in `[0, 1]`; suppressed entries read as 0.
    pub themes: [f64; 4],
    /// Theme flag counts; suppressed entries read as 0.
    pub flags: [f64; 4],
}

impl SviRecord {
    /// Percentile for `theme`.
    #[must_use]
    pub const fn theme(&self, theme: SviTheme) -> f64 {
        self.themes[theme as usize - 1]
    }

    /// Flag count for `theme`.
    #[must_use]
    pub const fn flags(&self, theme: SviTheme) -> f64 {
        self.flags[theme as usize - 1]
    }

    /// Whether any included theme carries a non-zero value.
    #[must_use]
    pub fn is_informative(&self) -> bool {
        SviTheme::INCLUDED.iter().any(|t| self.theme(*t) > 0.0)
    }
}

/// The loaded SVI table.
#[derive(Debug, Clone, Default)]
pub struct SviTable {
    /// `county_code -> record`.
    pub rows: BTreeMap<String, SviRecord>,
    /// Rows skipped for an unreadable record or county code.
    pub skipped: usize,
}

impl SviTable {
    /// Every county code in the table.
    #[must_use]
    pub fn county_codes(&self) -> BTreeSet<String> {
        self.rows.keys().cloned().collect()
    }

    /// Looks up one county.
    #[must_use]
    pub fn get(&self, county_code: &str) -> Option<&SviRecord> {
        self.rows.get(county_code)
    }
}

/// Reads a cell, mapping the suppression sentinel (and any other
/// negative) to 0.
fn value(columns: &ColumnIndex, record: &csv::StringRecord, field: &str) -> f64 {
    let v = columns.number(record, field);
    if v <= SENTINEL { 0.0 } else { v.max(0.0) }
}

/// Loads the SVI table. A missing file yields an empty table with a
/// warning.
///
/// # Errors
///
/// Returns [`GeoError::MissingColumn`] if no county code column is found,
/// or [`GeoError::Csv`] if the header row cannot be read.
pub fn load_svi_table(path: &Path, mapping: &ColumnMapping) -> Result<SviTable, GeoError> {
    if !path.exists() {
        log::warn!(
            "SVI table not found at {}; all vulnerability values will be zero",
            path.display()
        );
        return Ok(SviTable::default());
    }

    let mut reader = open_csv(path)?;
    let mut columns = ColumnIndex::new(reader.headers()?.iter());
    columns.resolve_all(mapping, tables::SVI, &[
        "county_code",
        "state",
        "theme1",
        "theme2",
        "theme3",
        "theme4",
        "flags1",
        "flags2",
        "flags3",
        "flags4",
    ]);
    columns.require("county_code")?;
    for missing in columns.missing() {
        log::warn!("SVI table: {missing}; reading as 0");
    }

    let mut table = SviTable::default();
    let mut suppressed = 0usize;

    for record in reader.records() {
        let Ok(record) = record else {
            table.skipped += 1;
            continue;
        };
        let Some(county_code) = columns
            .text(&record, "county_code")
            .and_then(fips::normalize_county_code)
        else {
            table.skipped += 1;
            continue;
        };

        let row = SviRecord {
            state: columns.text(&record, "state").unwrap_or_default().to_string(),
            themes: [1, 2, 3, 4].map(|i| value(&columns, &record, &format!("theme{i}"))),
            flags: [1, 2, 3, 4].map(|i| value(&columns, &record, &format!("flags{i}"))),
            county_code,
        };
        if !row.is_informative() {
            suppressed += 1;
        }
        table.rows.insert(row.county_code.clone(), row);
    }

    if table.skipped > 0 {
        log::warn!("Skipped {} malformed rows in SVI table {}", table.skipped, path.display());
    }
    log::info!(
        "Loaded {} counties from SVI table {} ({suppressed} without any included theme value)",
        table.rows.len(),
        path.display()
    );
    Ok(table)
}
