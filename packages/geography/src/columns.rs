//! Column resolution for CSV inputs.
//!
//! Header names are looked up once per file from the [`ColumnMapping`]
//! candidates, so row processing works with fixed indices instead of
//! probing names per row. Unresolved fields keep the list of tried
//! candidates for diagnostics.

use std::collections::BTreeMap;
use std::path::Path;

use tribal_risk_geography_models::config::ColumnMapping;

use crate::GeoError;

/// Built-in column mapping, embedded at compile time.
const DEFAULT_COLUMNS_TOML: &str = include_str!("../columns.toml");

/// Returns the built-in column mapping.
///
/// # Panics
///
/// Panics if the embedded TOML fails to parse. It is a compile-time
/// constant covered by a test.
#[must_use]
pub fn default_mapping() -> ColumnMapping {
    toml::from_str(DEFAULT_COLUMNS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse built-in column mapping: {e}"))
}

/// Loads a column mapping from `path`, or the built-in mapping when
/// `path` is `None`.
///
/// # Errors
///
/// Returns [`GeoError`] if the override file cannot be read or parsed.
pub fn load_mapping(path: Option<&Path>) -> Result<ColumnMapping, GeoError> {
    let Some(path) = path else {
        return Ok(default_mapping());
    };
    let contents = std::fs::read_to_string(path)?;
    let mapping: ColumnMapping = toml::from_str(&contents)?;
    log::info!(
        "Loaded column mapping v{} from {}",
        mapping.version,
        path.display()
    );
    Ok(mapping)
}

/// A field that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumn {
    /// Logical field name.
    pub field: String,
    /// Header names that were tried.
    pub tried: Vec<String>,
}

impl std::fmt::Display for MissingColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: none of [{}] present", self.field, self.tried.join(", "))
    }
}

/// Resolved field -> column index lookup for one file.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    headers: Vec<String>,
    resolved: BTreeMap<String, usize>,
    missing: Vec<MissingColumn>,
}

impl ColumnIndex {
    /// Creates an index over a header row.
    #[must_use]
    pub fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Resolves `field` to the first candidate present among the headers.
    /// Exact matches win over case-insensitive ones.
    pub fn resolve(&mut self, field: &str, candidates: &[String]) -> Option<usize> {
        let found = candidates
            .iter()
            .find_map(|c| self.headers.iter().position(|h| h == c))
            .or_else(|| {
                candidates.iter().find_map(|c| {
                    self.headers
                        .iter()
                        .position(|h| h.eq_ignore_ascii_case(c))
                })
            });

        match found {
            Some(idx) => {
                self.resolved.insert(field.to_string(), idx);
            }
            None => self.missing.push(MissingColumn {
                field: field.to_string(),
                tried: candidates.to_vec(),
            }),
        }
        found
    }

    /// Resolves every field in `fields` using the mapping for `table`.
    pub fn resolve_all(&mut self, mapping: &ColumnMapping, table: &str, fields: &[&str]) {
        for field in fields {
            self.resolve(field, mapping.candidates(table, field));
        }
    }

    /// Index of a resolved field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<usize> {
        self.resolved.get(field).copied()
    }

    /// Header name a resolved field maps to.
    #[must_use]
    pub fn header(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(|i| self.headers.get(i))
            .map(String::as_str)
    }

    /// Index of a field that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::MissingColumn`] with the tried candidates.
    pub fn require(&self, field: &str) -> Result<usize, GeoError> {
        self.get(field).ok_or_else(|| GeoError::MissingColumn {
            field: field.to_string(),
            tried: self
                .missing
                .iter()
                .find(|m| m.field == field)
                .map(|m| m.tried.clone())
                .unwrap_or_default(),
        })
    }

    /// Fields that could not be resolved.
    #[must_use]
    pub fn missing(&self) -> &[MissingColumn] {
        &self.missing
    }

    /// Trimmed, non-empty text value of `field` in `record`.
    #[must_use]
    pub fn text<'r>(&self, record: &'r csv::StringRecord, field: &str) -> Option<&'r str> {
        self.get(field)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric value of `field` in `record`. Missing columns, empty cells,
    /// and unparseable text all read as `0.0`.
    #[must_use]
    pub fn number(&self, record: &csv::StringRecord, field: &str) -> f64 {
        self.text(record, field)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

/// Opens a CSV file with the reader settings every loader uses.
///
/// # Errors
///
/// Returns [`GeoError::Csv`] if the file cannot be opened.
pub fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>, GeoError> {
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribal_risk_geography_models::config::tables;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn built_in_mapping_parses() {
        let mapping = default_mapping();
        assert_eq!(mapping.version, 1);
        for table in [
            tables::BOUNDARIES,
            tables::COUNTIES,
            tables::RELATIONSHIP,
            tables::HAZARD,
            tables::WILDFIRE,
            tables::SVI,
        ] {
            assert!(mapping.tables.contains_key(table), "missing table {table}");
        }
        assert_eq!(
            mapping.candidates(tables::HAZARD, "category_score"),
            ["{code}_RISKS"]
        );
    }

    #[test]
    fn prefers_earlier_candidate() {
        let mut index = ColumnIndex::new(["NAME", "GEOID", "AIANNHCE"]);
        let idx = index.resolve("boundary_id", &strings(&["AIANNHCE", "GEOID"]));
        assert_eq!(idx, Some(2));
    }

    #[test]
    fn exposes_resolved_header() {
        let mut index = ColumnIndex::new(["NAMELSAD", "GEOID"]);
        index.resolve("name", &strings(&["NAME", "namelsad"]));
        assert_eq!(index.header("name"), Some("NAMELSAD"));
        assert_eq!(index.header("other"), None);
    }

    #[test]
    fn exact_match_beats_case_insensitive() {
        let mut index = ColumnIndex::new(["geoid", "GEOID"]);
        assert_eq!(index.resolve("id", &strings(&["GEOID"])), Some(1));

        let mut index = ColumnIndex::new(["geoid"]);
        assert_eq!(index.resolve("id", &strings(&["GEOID"])), Some(0));
    }

    #[test]
    fn records_tried_candidates() {
        let mut index = ColumnIndex::new(["A"]);
        index.resolve("risk_score", &strings(&["RISK_SCORE", "SCORE"]));
        let err = index.require("risk_score").unwrap_err();
        match err {
            GeoError::MissingColumn { field, tried } => {
                assert_eq!(field, "risk_score");
                assert_eq!(tried, strings(&["RISK_SCORE", "SCORE"]));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            index.missing()[0].to_string(),
            "risk_score: none of [RISK_SCORE, SCORE] present"
        );
    }

    #[test]
    fn numbers_default_to_zero() {
        let mut index = ColumnIndex::new(["a", "b", "c"]);
        index.resolve("a", &strings(&["a"]));
        index.resolve("b", &strings(&["b"]));
        index.resolve("c", &strings(&["c"]));
        let record = csv::StringRecord::from(vec!["12.5", "", "n/a"]);
        assert!((index.number(&record, "a") - 12.5).abs() < f64::EPSILON);
        assert!(index.number(&record, "b").abs() < f64::EPSILON);
        assert!(index.number(&record, "c").abs() < f64::EPSILON);
        assert!(index.number(&record, "missing").abs() < f64::EPSILON);
    }
}
