//! Boundary and county polygon loading from `GeoJSON`.
//!
//! Property names are resolved once per file against the column mapping
//! (using the first feature's keys), then every feature is read through
//! the resolved names. Features without a usable id or polygon geometry
//! are skipped and counted.

use std::path::Path;

use geo::{BoundingRect, MultiPolygon};
use tribal_risk_geography::GeoError;
use tribal_risk_geography::columns::ColumnIndex;
use tribal_risk_geography_models::config::{ColumnMapping, tables};
use tribal_risk_geography_models::fips;
use tribal_risk_spatial::geometry_to_multipolygon;

/// One boundary polygon record.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// Boundary identifier.
    pub boundary_id: String,
    /// Display name, if present.
    pub name: Option<String>,
    /// Owning state FIPS code.
    pub state_fips: String,
    /// Geographic (lon/lat) geometry.
    pub geometry: MultiPolygon<f64>,
}

/// One county polygon record.
#[derive(Debug, Clone)]
pub struct CountyFeature {
    /// Five-digit county code.
    pub county_code: String,
    /// State FIPS code (first two digits of `county_code`).
    pub state_fips: String,
    /// Geographic (lon/lat) geometry.
    pub geometry: MultiPolygon<f64>,
}

/// Reads the `features` array of a `GeoJSON` `FeatureCollection`.
fn read_features(path: &Path) -> Result<Vec<serde_json::Value>, GeoError> {
    if !path.exists() {
        return Err(GeoError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let features = json
        .get("features")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| GeoError::Conversion {
            message: format!("{} is not a GeoJSON FeatureCollection", path.display()),
        })?;
    Ok(features.clone())
}

/// Builds a property index from the first feature's keys.
fn property_index(
    features: &[serde_json::Value],
    mapping: &ColumnMapping,
    table: &str,
    fields: &[&str],
) -> ColumnIndex {
    let keys: Vec<&str> = features
        .first()
        .and_then(|f| f.get("properties"))
        .and_then(serde_json::Value::as_object)
        .map(|props| props.keys().map(String::as_str).collect())
        .unwrap_or_default();
    let mut index = ColumnIndex::new(keys);
    index.resolve_all(mapping, table, fields);
    for missing in index.missing() {
        log::debug!("{table} property not resolved: {missing}");
    }
    index
}

/// Reads a property as text; numbers are rendered without quotes.
fn property(feature: &serde_json::Value, index: &ColumnIndex, field: &str) -> Option<String> {
    let key = index.header(field)?;
    match feature.get("properties")?.get(key)? {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Guesses whether an untagged boundary lies in Alaska from its bounding
/// box (north of 50N and west of 129W, or across the antimeridian).
fn looks_like_alaska(geometry: &MultiPolygon<f64>) -> bool {
    geometry.bounding_rect().is_some_and(|rect| {
        let center_y = f64::midpoint(rect.min().y, rect.max().y);
        center_y >= 50.0 && (rect.max().x <= -129.0 || rect.min().x >= 170.0)
    })
}

/// Loads boundary polygons.
///
/// Boundaries without a state property are tagged `high_latitude_state`
/// when their extent lies in Alaska, otherwise left untagged and placed
/// in the contiguous region.
///
/// # Errors
///
/// Returns [`GeoError`] if the file is missing, unreadable, not a
/// `FeatureCollection`, or lacks a boundary id property.
pub fn load_boundaries(
    path: &Path,
    mapping: &ColumnMapping,
    high_latitude_state: &str,
) -> Result<Vec<BoundaryFeature>, GeoError> {
    let features = read_features(path)?;
    let index = property_index(&features, mapping, tables::BOUNDARIES, &[
        "boundary_id",
        "name",
        "state",
    ]);
    if !features.is_empty() {
        index.require("boundary_id")?;
    }

    let mut out = Vec::with_capacity(features.len());
    let mut skipped = 0usize;
    let mut inferred = 0usize;

    for feature in &features {
        let Some(boundary_id) = property(feature, &index, "boundary_id") else {
            skipped += 1;
            continue;
        };
        let Some(geometry) = feature.get("geometry").and_then(geometry_to_multipolygon) else {
            log::warn!("Boundary {boundary_id} has no polygon geometry; skipping");
            skipped += 1;
            continue;
        };
        let state_fips = match property(feature, &index, "state").and_then(|s| fips::normalize_state(&s)) {
            Some(state) => state.to_string(),
            None => {
                inferred += 1;
                if looks_like_alaska(&geometry) {
                    high_latitude_state.to_string()
                } else {
                    String::new()
                }
            }
        };

        out.push(BoundaryFeature {
            boundary_id,
            name: property(feature, &index, "name"),
            state_fips,
            geometry,
        });
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} boundary features in {}", path.display());
    }
    if inferred > 0 {
        log::info!("{inferred} boundaries had no state tag; region inferred from extent");
    }
    log::info!("Loaded {} boundaries from {}", out.len(), path.display());
    Ok(out)
}

/// Loads county polygons.
///
/// # Errors
///
/// Returns [`GeoError`] if the file is missing, unreadable, or not a
/// `FeatureCollection`.
pub fn load_counties(path: &Path, mapping: &ColumnMapping) -> Result<Vec<CountyFeature>, GeoError> {
    let features = read_features(path)?;
    let index = property_index(&features, mapping, tables::COUNTIES, &[
        "county_code",
        "state_fips",
        "county_fips",
    ]);

    let mut out = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for feature in &features {
        let split = || {
            fips::county_code(
                &property(feature, &index, "state_fips")?,
                &property(feature, &index, "county_fips")?,
            )
        };
        let Some(county_code) = split().or_else(|| {
            property(feature, &index, "county_code")
                .and_then(|c| fips::normalize_county_code(&c))
        }) else {
            skipped += 1;
            continue;
        };
        let Some(geometry) = feature.get("geometry").and_then(geometry_to_multipolygon) else {
            skipped += 1;
            continue;
        };

        out.push(CountyFeature {
            state_fips: county_code[..2].to_string(),
            county_code,
            geometry,
        });
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} county features in {}", path.display());
    }
    log::info!("Loaded {} counties from {}", out.len(), path.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use tribal_risk_geography::columns::default_mapping;

    use super::*;

    fn square_geometry(x: f64, y: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
        })
    }

    fn write_collection(dir: &Path, name: &str, features: Vec<serde_json::Value>) -> std::path::PathBuf {
        let path = dir.join(name);
        let fc = serde_json::json!({"type": "FeatureCollection", "features": features});
        std::fs::write(&path, fc.to_string()).unwrap();
        path
    }

    #[test]
    fn loads_boundaries_with_state_tags_and_inference() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_collection(dir.path(), "b.geojson", vec![
            serde_json::json!({
                "type": "Feature",
                "properties": {"GEOID": "0010", "NAMELSAD": "Alpha Reservation", "STUSPS": "AZ"},
                "geometry": square_geometry(-111.0, 35.0)
            }),
            serde_json::json!({
                "type": "Feature",
                "properties": {"GEOID": 6020, "NAMELSAD": "Beta ANVSA"},
                "geometry": square_geometry(-150.0, 61.0)
            }),
            serde_json::json!({
                "type": "Feature",
                "properties": {"GEOID": "0030"},
                "geometry": null
            }),
        ]);

        let boundaries = load_boundaries(&path, &default_mapping(), "02").unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].state_fips, "04");
        assert_eq!(boundaries[0].name.as_deref(), Some("Alpha Reservation"));
        assert_eq!(boundaries[1].boundary_id, "6020");
        assert_eq!(boundaries[1].state_fips, "02");
    }

    #[test]
    fn inferred_region_uses_configured_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_collection(dir.path(), "b.geojson", vec![serde_json::json!({
            "type": "Feature",
            "properties": {"GEOID": "6020"},
            "geometry": square_geometry(-150.0, 61.0)
        })]);

        let boundaries = load_boundaries(&path, &default_mapping(), "AK-TEST").unwrap();
        assert_eq!(boundaries[0].state_fips, "AK-TEST");
    }

    #[test]
    fn loads_counties_from_split_or_full_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_collection(dir.path(), "c.geojson", vec![
            serde_json::json!({
                "type": "Feature",
                "properties": {"STATEFP": "4", "COUNTYFP": "1", "GEOID": "04001"},
                "geometry": square_geometry(-110.0, 36.0)
            }),
            serde_json::json!({
                "type": "Feature",
                "properties": {"GEOID": "2013"},
                "geometry": square_geometry(-160.0, 55.0)
            }),
        ]);

        let counties = load_counties(&path, &default_mapping()).unwrap();
        assert_eq!(counties.len(), 2);
        assert_eq!(counties[0].county_code, "04001");
        assert_eq!(counties[1].county_code, "02013");
        assert_eq!(counties[1].state_fips, "02");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_counties(&dir.path().join("none.geojson"), &default_mapping()).unwrap_err();
        assert!(matches!(err, GeoError::MissingInput { .. }));
    }
}
