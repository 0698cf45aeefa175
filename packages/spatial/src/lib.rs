#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon overlay for boundary-to-county weighting.
//!
//! Geometry work sits behind the narrow [`OverlayBackend`] capability
//! (`project`, `intersect`, `area`) so the crosswalk builder can be tested
//! against synthetic fixtures and the backend swapped without touching
//! the weighting logic. [`GeoOverlay`] is the `geo`-backed implementation;
//! [`overlay_pairs`] drives any backend over two polygon layers using an
//! R-tree to skip pairs whose bounding boxes do not touch.

pub mod overlay;
pub mod projection;

use geo::MultiPolygon;
use geojson::GeoJson;
use thiserror::Error;

pub use overlay::{GeoOverlay, Overlap, OverlayResult, overlay_pairs};

/// Errors that can occur during overlay computation.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// A coordinate could not be projected.
    #[error("Projection error: {message}")]
    Projection {
        /// Description of what went wrong.
        message: String,
    },

    /// Polygon intersection failed.
    #[error("Intersection failed: {message}")]
    Intersection {
        /// Description of what went wrong.
        message: String,
    },
}

/// Equal-area coordinate systems used for overlap measurement.
///
/// A single conic projection distorts area badly across both the
/// contiguous states and Alaska, so each region gets its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqualAreaCrs {
    /// NAD83 / Conus Albers (EPSG:5070).
    ConusAlbers,
    /// NAD83 / Alaska Albers (EPSG:3338).
    AlaskaAlbers,
}

impl EqualAreaCrs {
    /// EPSG identifier, e.g. `"EPSG:5070"`.
    #[must_use]
    pub const fn epsg(self) -> &'static str {
        match self {
            Self::ConusAlbers => "EPSG:5070",
            Self::AlaskaAlbers => "EPSG:3338",
        }
    }
}

/// Geometry capability required by the crosswalk builder.
pub trait OverlayBackend {
    /// Reprojects geographic (lon/lat degree) polygons into `crs`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Projection`] if any vertex cannot be
    /// projected.
    fn project(
        &self,
        polygon: &MultiPolygon<f64>,
        crs: EqualAreaCrs,
    ) -> Result<MultiPolygon<f64>, OverlayError>;

    /// Intersection of two projected polygons, `None` if they do not
    /// overlap with positive area.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Intersection`] if the operation fails.
    fn intersect(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<Option<MultiPolygon<f64>>, OverlayError>;

    /// Planar area in squared projected units.
    fn area(&self, polygon: &MultiPolygon<f64>) -> f64;
}

/// Parses a `GeoJSON` geometry value into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn geometry_to_multipolygon(geometry: &serde_json::Value) -> Option<MultiPolygon<f64>> {
    let geojson = GeoJson::from_json_value(geometry.clone()).ok()?;
    if let GeoJson::Geometry(geom) = geojson {
        let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
        match geo_geom {
            geo::Geometry::MultiPolygon(mp) => Some(mp),
            geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
            _ => None,
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_polygon_and_multipolygon() {
        let poly = serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
        });
        assert_eq!(geometry_to_multipolygon(&poly).unwrap().0.len(), 1);

        let multi = serde_json::json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 2.0]]]
            ]
        });
        assert_eq!(geometry_to_multipolygon(&multi).unwrap().0.len(), 2);
    }

    #[test]
    fn rejects_non_polygons() {
        let point = serde_json::json!({"type": "Point", "coordinates": [0.0, 0.0]});
        assert!(geometry_to_multipolygon(&point).is_none());
        assert!(geometry_to_multipolygon(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn epsg_codes() {
        assert_eq!(EqualAreaCrs::ConusAlbers.epsg(), "EPSG:5070");
        assert_eq!(EqualAreaCrs::AlaskaAlbers.epsg(), "EPSG:3338");
    }
}
