//! Albers equal-area conic projection on the GRS 1980 ellipsoid.
//!
//! Forward equations follow Snyder, *Map Projections: A Working Manual*
//! (USGS PP 1395), eqs. 14-1 through 14-6 and 3-12. Only the forward
//! direction is needed: polygons are projected, measured, and discarded.

use std::f64::consts::PI;

use geo::{Coord, MapCoords, MultiPolygon};

use crate::{EqualAreaCrs, OverlayError};

/// GRS 1980 semi-major axis in meters.
const GRS80_A: f64 = 6_378_137.0;

/// GRS 1980 inverse flattening.
const GRS80_INV_F: f64 = 298.257_222_101;

/// Precomputed constants for one Albers parameterization.
#[derive(Debug, Clone, Copy)]
pub struct AlbersEqualArea {
    a: f64,
    e: f64,
    e2: f64,
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl AlbersEqualArea {
    /// Builds a projection from standard parallels, latitude of origin,
    /// and central meridian (all in degrees).
    #[must_use]
    pub fn new(parallel1: f64, parallel2: f64, lat0: f64, lon0: f64) -> Self {
        let a = GRS80_A;
        let f = 1.0 / GRS80_INV_F;
        let e2 = f * (2.0 - f);
        let e = e2.sqrt();

        let phi1 = parallel1.to_radians();
        let phi2 = parallel2.to_radians();
        let m1 = m(phi1, e2);
        let m2 = m(phi2, e2);
        let q1 = q(phi1, e, e2);
        let q2 = q(phi2, e, e2);
        let q0 = q(lat0.to_radians(), e, e2);

        let n = (m1.mul_add(m1, -(m2 * m2))) / (q2 - q1);
        let c = n.mul_add(q1, m1 * m1);
        let rho0 = a * n.mul_add(-q0, c).sqrt() / n;

        Self {
            a,
            e,
            e2,
            lon0: lon0.to_radians(),
            n,
            c,
            rho0,
        }
    }

    /// Parameters for `crs`.
    #[must_use]
    pub fn for_crs(crs: EqualAreaCrs) -> Self {
        match crs {
            // NAD83 / Conus Albers
            EqualAreaCrs::ConusAlbers => Self::new(29.5, 45.5, 23.0, -96.0),
            // NAD83 / Alaska Albers
            EqualAreaCrs::AlaskaAlbers => Self::new(55.0, 65.0, 50.0, -154.0),
        }
    }

    /// Projects a longitude/latitude pair (degrees) to meters.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Projection`] for out-of-range or non-finite
    /// coordinates.
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), OverlayError> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 || lon.abs() > 360.0 {
            return Err(OverlayError::Projection {
                message: format!("coordinate out of range: ({lon}, {lat})"),
            });
        }

        // Wrap so features straddling the antimeridian (western
        // Aleutians) stay contiguous.
        let mut dlon = lon.to_radians() - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let q = q(lat.to_radians(), self.e, self.e2);
        let rho = self.a * self.n.mul_add(-q, self.c).max(0.0).sqrt() / self.n;
        let theta = self.n * dlon;
        Ok((rho * theta.sin(), rho.mul_add(-theta.cos(), self.rho0)))
    }

    /// Projects every vertex of `polygon`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Projection`] if any vertex is invalid.
    pub fn project(&self, polygon: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, OverlayError> {
        polygon.try_map_coords(|Coord { x, y }| {
            let (px, py) = self.forward(x, y)?;
            Ok(Coord { x: px, y: py })
        })
    }
}

/// Snyder eq. 3-12.
fn q(phi: f64, e: f64, e2: f64) -> f64 {
    let sin = phi.sin();
    let esin = e * sin;
    (1.0 - e2) * (sin / (1.0 - e2 * sin * sin) - (1.0 / (2.0 * e)) * ((1.0 - esin) / (1.0 + esin)).ln())
}

/// Snyder eq. 14-15.
fn m(phi: f64, e2: f64) -> f64 {
    let sin = phi.sin();
    phi.cos() / (1.0 - e2 * sin * sin).sqrt()
}

#[cfg(test)]
mod tests {
    use geo::{Area, polygon};

    use super::*;

    #[test]
    fn origin_maps_to_zero() {
        for (crs, lon, lat) in [
            (EqualAreaCrs::ConusAlbers, -96.0, 23.0),
            (EqualAreaCrs::AlaskaAlbers, -154.0, 50.0),
        ] {
            let (x, y) = AlbersEqualArea::for_crs(crs).forward(lon, lat).unwrap();
            assert!(x.abs() < 1e-6 && y.abs() < 1e-6, "{crs:?}: ({x}, {y})");
        }
    }

    #[test]
    fn conus_reference_point() {
        // Washington, DC
        let (x, y) = AlbersEqualArea::for_crs(EqualAreaCrs::ConusAlbers)
            .forward(-77.0365, 38.8977)
            .unwrap();
        assert!((x - 1_618_600.05).abs() < 1.0, "x = {x}");
        assert!((y - 1_925_474.64).abs() < 1.0, "y = {y}");
    }

    #[test]
    fn one_degree_cell_has_ellipsoidal_area() {
        let proj = AlbersEqualArea::for_crs(EqualAreaCrs::ConusAlbers);
        let cell = MultiPolygon(vec![polygon![
            (x: -100.0, y: 40.0),
            (x: -99.0, y: 40.0),
            (x: -99.0, y: 41.0),
            (x: -100.0, y: 41.0),
        ]]);
        let area_km2 = proj.project(&cell).unwrap().unsigned_area() / 1e6;
        assert!((area_km2 - 9_412.85).abs() / 9_412.85 < 1e-3, "{area_km2}");
    }

    #[test]
    fn area_is_independent_of_longitude() {
        let proj = AlbersEqualArea::for_crs(EqualAreaCrs::ConusAlbers);
        let cell = |lon: f64| {
            MultiPolygon(vec![polygon![
                (x: lon, y: 35.0),
                (x: lon + 0.5, y: 35.0),
                (x: lon + 0.5, y: 35.5),
                (x: lon, y: 35.5),
            ]])
        };
        let west = proj.project(&cell(-120.0)).unwrap().unsigned_area();
        let east = proj.project(&cell(-75.0)).unwrap().unsigned_area();
        assert!((west - east).abs() / west < 1e-9);
    }

    #[test]
    fn antimeridian_longitudes_wrap() {
        let proj = AlbersEqualArea::for_crs(EqualAreaCrs::AlaskaAlbers);
        let (x_east, _) = proj.forward(179.5, 52.0).unwrap();
        let (x_west, _) = proj.forward(-179.5, 52.0).unwrap();
        // One degree apart, not 359
        assert!((x_east - x_west).abs() < 150_000.0);
    }

    #[test]
    fn rejects_invalid_coordinates() {
        let proj = AlbersEqualArea::for_crs(EqualAreaCrs::ConusAlbers);
        assert!(proj.forward(-100.0, 91.0).is_err());
        assert!(proj.forward(f64::NAN, 40.0).is_err());
    }
}
