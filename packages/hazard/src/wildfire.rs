//! Independent wildfire risk dataset used to override the source table's
//! wildfire category.

use std::collections::BTreeMap;
use std::path::Path;

use tribal_risk_geography::GeoError;
use tribal_risk_geography::columns::{ColumnIndex, open_csv};
use tribal_risk_geography_models::config::{ColumnMapping, tables};

/// Wildfire risk values keyed by boundary id and by normalized name.
#[derive(Debug, Clone, Default)]
pub struct WildfireTable {
    by_boundary: BTreeMap<String, f64>,
    by_name: BTreeMap<String, f64>,
}

/// Lowercase alphanumeric words joined by single spaces.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl WildfireTable {
    /// Number of rows loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_boundary.len().max(self.by_name.len())
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_boundary.is_empty() && self.by_name.is_empty()
    }

    /// Adds one row.
    pub fn insert(&mut self, boundary_id: Option<&str>, name: Option<&str>, value: f64) {
        if let Some(id) = boundary_id {
            self.by_boundary.insert(id.to_string(), value);
        }
        if let Some(name) = name.map(normalize_name).filter(|n| !n.is_empty()) {
            self.by_name.insert(name, value);
        }
    }

    /// Value for an entity: the first of its boundaries with a non-zero
    /// row, then the first non-zero row (in normalized-name order) whose
    /// name contains, or is contained in, the entity's name as whole words.
    #[must_use]
    pub fn lookup(&self, boundaries: &[String], entity_name: &str) -> Option<f64> {
        if let Some(value) = boundaries
            .iter()
            .filter_map(|b| self.by_boundary.get(b))
            .find(|v| **v > 0.0)
        {
            return Some(*value);
        }

        let wanted = normalize_name(entity_name);
        if wanted.is_empty() {
            return None;
        }
        let wanted = format!(" {wanted} ");
        self.by_name
            .iter()
            .filter(|(_, value)| **value > 0.0)
            .find(|(name, _)| {
                let name = format!(" {name} ");
                name.contains(&wanted) || wanted.contains(&name)
            })
            .map(|(_, value)| *value)
    }
}

/// Loads the wildfire dataset.
///
/// A missing file yields an empty table with a warning; no override is
/// applied then.
///
/// # Errors
///
/// Returns [`GeoError`] if the file exists but cannot be read, or has no
/// risk value column.
pub fn load_wildfire(path: &Path, mapping: &ColumnMapping) -> Result<WildfireTable, GeoError> {
    if !path.exists() {
        log::warn!(
            "Wildfire table {} not found; wildfire scores come from the hazard table only",
            path.display()
        );
        return Ok(WildfireTable::default());
    }

    let mut reader = open_csv(path)?;
    let mut columns = ColumnIndex::new(reader.headers()?.iter());
    columns.resolve_all(mapping, tables::WILDFIRE, &["boundary_id", "name", "risk_to_homes"]);
    columns.require("risk_to_homes")?;

    let mut table = WildfireTable::default();
    let mut skipped = 0usize;
    for record in reader.records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };
        let boundary_id = columns.text(&record, "boundary_id");
        let name = columns.text(&record, "name");
        if boundary_id.is_none() && name.is_none() {
            skipped += 1;
            continue;
        }
        table.insert(boundary_id, name, columns.number(&record, "risk_to_homes"));
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed rows in wildfire table {}", path.display());
    }
    log::info!("Loaded {} wildfire rows from {}", table.len(), path.display());
    Ok(table)
}
