//! `geo`-backed overlay and the pairwise overlay driver.

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

use crate::projection::AlbersEqualArea;
use crate::{EqualAreaCrs, OverlayBackend, OverlayError};

/// Square meters per square kilometer.
const SQ_M_PER_SQ_KM: f64 = 1_000_000.0;

/// [`OverlayBackend`] implemented with `geo` boolean operations and the
/// built-in Albers projections.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoOverlay;

impl OverlayBackend for GeoOverlay {
    fn project(
        &self,
        polygon: &MultiPolygon<f64>,
        crs: EqualAreaCrs,
    ) -> Result<MultiPolygon<f64>, OverlayError> {
        AlbersEqualArea::for_crs(crs).project(polygon)
    }

    fn intersect(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<Option<MultiPolygon<f64>>, OverlayError> {
        // The sweep-line implementation can panic on degenerate rings;
        // surface that as an error so the caller can skip the region.
        let result = catch_unwind(AssertUnwindSafe(|| a.intersection(b))).map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic during polygon intersection".to_string());
            OverlayError::Intersection { message }
        })?;

        if result.0.is_empty() || result.unsigned_area() <= 0.0 {
            Ok(None)
        } else {
            Ok(Some(result))
        }
    }

    fn area(&self, polygon: &MultiPolygon<f64>) -> f64 {
        polygon.unsigned_area()
    }
}

/// One positive-area intersection between a left and a right polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    /// Index into the left layer.
    pub left: usize,
    /// Index into the right layer.
    pub right: usize,
    /// Intersection area in square kilometers.
    pub area_sqkm: f64,
}

/// Output of [`overlay_pairs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayResult {
    /// Projected area of each left polygon, in square kilometers.
    pub left_areas_sqkm: Vec<f64>,
    /// Every positive-area intersection, ordered by `(left, right)`.
    pub overlaps: Vec<Overlap>,
}

/// A projected right-layer polygon stored in the R-tree.
struct Entry<'a> {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: &'a MultiPolygon<f64>,
}

impl RTreeObject for Entry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Projects both layers into `crs` and intersects every left polygon
/// with every right polygon whose bounding box it touches.
///
/// # Errors
///
/// Returns [`OverlayError`] if any projection or intersection fails; the
/// caller treats the whole region as failed.
pub fn overlay_pairs(
    backend: &dyn OverlayBackend,
    left: &[&MultiPolygon<f64>],
    right: &[&MultiPolygon<f64>],
    crs: EqualAreaCrs,
) -> Result<OverlayResult, OverlayError> {
    let left_projected = left
        .iter()
        .map(|p| backend.project(p, crs))
        .collect::<Result<Vec<_>, _>>()?;
    let right_projected = right
        .iter()
        .map(|p| backend.project(p, crs))
        .collect::<Result<Vec<_>, _>>()?;

    let tree = RTree::bulk_load(
        right_projected
            .iter()
            .enumerate()
            .filter_map(|(index, polygon)| {
                Some(Entry {
                    index,
                    envelope: envelope(polygon)?,
                    polygon,
                })
            })
            .collect(),
    );

    let mut result = OverlayResult {
        left_areas_sqkm: Vec::with_capacity(left_projected.len()),
        overlaps: Vec::new(),
    };

    for (left_index, polygon) in left_projected.iter().enumerate() {
        result
            .left_areas_sqkm
            .push(backend.area(polygon) / SQ_M_PER_SQ_KM);

        let Some(query) = envelope(polygon) else {
            continue;
        };
        let mut candidates: Vec<&Entry> = tree.locate_in_envelope_intersecting(&query).collect();
        candidates.sort_by_key(|e| e.index);

        for candidate in candidates {
            if let Some(shared) = backend.intersect(polygon, candidate.polygon)? {
                result.overlaps.push(Overlap {
                    left: left_index,
                    right: candidate.index,
                    area_sqkm: backend.area(&shared) / SQ_M_PER_SQ_KM,
                });
            }
        }
    }

    log::debug!(
        "{}: {} x {} polygons -> {} overlaps",
        crs.epsg(),
        left.len(),
        right.len(),
        result.overlaps.len()
    );

    Ok(result)
}

/// Bounding box of a [`MultiPolygon`], `None` if it has no coordinates.
fn envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ]])
    }

    #[test]
    fn intersects_overlapping_squares() {
        let a = square(0.0, 0.0, 2.0, 2.0);
        let b = square(1.0, 0.0, 3.0, 2.0);
        let shared = GeoOverlay.intersect(&a, &b).unwrap().unwrap();
        assert!((GeoOverlay.area(&shared) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_squares_do_not_intersect() {
        let a = square(0.0, 0.0, 1.0, 1.0);
        let b = square(5.0, 5.0, 6.0, 6.0);
        assert!(GeoOverlay.intersect(&a, &b).unwrap().is_none());
    }

    #[test]
    fn touching_squares_have_no_positive_overlap() {
        let a = square(0.0, 0.0, 1.0, 1.0);
        let b = square(1.0, 0.0, 2.0, 1.0);
        assert!(GeoOverlay.intersect(&a, &b).unwrap().is_none());
    }

    #[test]
    fn splits_boundary_across_counties() {
        // Boundary spans two counties 65/35 by longitude, inside CONUS.
        let boundary = square(-100.0, 40.0, -99.0, 40.2);
        let west = square(-101.0, 39.0, -99.35, 41.0);
        let east = square(-99.35, 39.0, -98.0, 41.0);
        let far = square(-80.0, 30.0, -79.0, 31.0);

        let result = overlay_pairs(
            &GeoOverlay,
            &[&boundary],
            &[&west, &far, &east],
            EqualAreaCrs::ConusAlbers,
        )
        .unwrap();

        assert_eq!(result.overlaps.len(), 2);
        assert_eq!(result.overlaps[0].right, 0);
        assert_eq!(result.overlaps[1].right, 2);

        let total = result.left_areas_sqkm[0];
        let west_fraction = result.overlaps[0].area_sqkm / total;
        let east_fraction = result.overlaps[1].area_sqkm / total;
        assert!((west_fraction - 0.65).abs() < 1e-3, "{west_fraction}");
        assert!((west_fraction + east_fraction - 1.0).abs() < 1e-6);
    }

    #[test]
    fn projection_failure_is_an_error() {
        let bad = square(-100.0, 89.0, -99.0, 95.0);
        let county = square(-101.0, 39.0, -98.0, 41.0);
        let result = overlay_pairs(&GeoOverlay, &[&bad], &[&county], EqualAreaCrs::ConusAlbers);
        assert!(matches!(result, Err(OverlayError::Projection { .. })));
    }
}
