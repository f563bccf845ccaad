//! Polygon-mode sampling

use crate::maybe_rayon::*;
use crate::vector::{bounding_box, contains_point};
use agriplast_core::{BandSet, MultiBandImage, Result};
use geo::Geometry;

use super::{LabeledGeometry, SampledPixel};

/// Sample every pixel whose center lies inside each labeled polygon.
///
/// Regions are sampled independently, so a pixel covered by two regions
/// yields two rows. Pixels with no-data in any band are dropped.
/// Non-polygonal geometries are ignored.
pub fn sample_polygons(
    image: &MultiBandImage,
    bands: &BandSet,
    regions: &[LabeledGeometry],
) -> Result<Vec<SampledPixel>> {
    let layers = bands
        .iter()
        .map(|name| image.band(name))
        .collect::<Result<Vec<_>>>()?;
    let (rows, cols) = image.shape();
    let transform = *image.transform();

    let sampled: Vec<SampledPixel> = regions
        .into_par_iter()
        .flat_map(|region| {
            let mut region_rows = Vec::new();
            if !matches!(
                region.geometry,
                Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_)
            ) {
                return region_rows;
            }
            let Some(bb) = bounding_box(&region.geometry) else {
                return region_rows;
            };
            let Some((r0, c0, r1, c1)) = pixel_window(&transform, bb.as_tuple(), rows, cols)
            else {
                return region_rows;
            };

            for row in r0..=r1 {
                'pixels: for col in c0..=c1 {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    if !contains_point(&region.geometry, x, y) {
                        continue;
                    }
                    let mut features = Vec::with_capacity(layers.len());
                    for layer in &layers {
                        let v = unsafe { layer.get_unchecked(row, col) };
                        if layer.is_nodata(v) {
                            continue 'pixels;
                        }
                        features.push(v);
                    }
                    region_rows.push(SampledPixel {
                        features,
                        class: region.class,
                        x,
                        y,
                    });
                }
            }
            region_rows
        })
        .collect();

    Ok(sampled)
}

/// Inclusive pixel index window `(r0, c0, r1, c1)` covering `bounds`,
/// clamped to the grid. `None` when the bounds miss the grid.
fn pixel_window(
    transform: &agriplast_core::GeoTransform,
    bounds: (f64, f64, f64, f64),
    rows: usize,
    cols: usize,
) -> Option<(usize, usize, usize, usize)> {
    if rows == 0 || cols == 0 {
        return None;
    }
    let (min_x, min_y, max_x, max_y) = bounds;
    let (ca, ra) = transform.geo_to_pixel(min_x, max_y);
    let (cb, rb) = transform.geo_to_pixel(max_x, min_y);
    if ![ca, ra, cb, rb].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (c_lo, c_hi) = (ca.min(cb).floor(), ca.max(cb).floor());
    let (r_lo, r_hi) = (ra.min(rb).floor(), ra.max(rb).floor());
    if c_hi < 0.0 || r_hi < 0.0 || c_lo >= cols as f64 || r_lo >= rows as f64 {
        return None;
    }
    let clamp = |v: f64, n: usize| (v.max(0.0) as usize).min(n - 1);
    Some((
        clamp(r_lo, rows),
        clamp(c_lo, cols),
        clamp(r_hi, rows),
        clamp(c_hi, cols),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::grid_scene;
    use super::*;
    use geo::{LineString, Polygon};

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_polygon_samples_contained_centers() {
        let image = grid_scene();
        let bands = BandSet::new(["A"]).unwrap();
        let regions = [LabeledGeometry::new(rect(2.0, 2.0, 5.0, 4.0), 3)];

        let rows = sample_polygons(&image, &bands, &regions).unwrap();
        // 3 columns x 2 rows of centers
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.class == 3));
    }

    #[test]
    fn test_masked_pixels_inside_polygon_dropped() {
        let mut image = grid_scene();
        // pixel center (2.5, 2.5) -> row 7, col 2
        image.band_mut("A").unwrap().set(7, 2, f64::NAN).unwrap();
        let bands = BandSet::new(["A", "B"]).unwrap();
        let regions = [LabeledGeometry::new(rect(2.0, 2.0, 5.0, 4.0), 0)];

        let rows = sample_polygons(&image, &bands, &regions).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.features.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_masked_first_pixel_keeps_rest_of_row() {
        let mut image = grid_scene();
        // strip of centers (0.5..2.5, 5.5) on row 4; mask the first
        image.band_mut("A").unwrap().set(4, 0, f64::NAN).unwrap();
        let bands = BandSet::new(["A"]).unwrap();
        let regions = [LabeledGeometry::new(rect(0.0, 5.0, 3.0, 6.0), 1)];

        let rows = sample_polygons(&image, &bands, &regions).unwrap();
        assert_eq!(rows.len(), 2);
        let xs: Vec<f64> = rows.iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![1.5, 2.5]);
    }

    #[test]
    fn test_overlapping_regions_sample_independently() {
        let image = grid_scene();
        let bands = BandSet::new(["B"]).unwrap();
        let regions = [
            LabeledGeometry::new(rect(0.0, 0.0, 2.0, 2.0), 0),
            LabeledGeometry::new(rect(1.0, 1.0, 3.0, 3.0), 1),
        ];
        let rows = sample_polygons(&image, &bands, &regions).unwrap();
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn test_polygon_partly_off_grid_is_clamped() {
        let image = grid_scene();
        let bands = BandSet::new(["A"]).unwrap();
        let regions = [LabeledGeometry::new(rect(-5.0, 8.0, 1.0, 15.0), 2)];
        let rows = sample_polygons(&image, &bands, &regions).unwrap();
        // centers x = 0.5, y = 8.5, 9.5
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_polygon_off_grid_samples_nothing() {
        let image = grid_scene();
        let bands = BandSet::new(["A"]).unwrap();
        let regions = [LabeledGeometry::new(rect(20.0, 20.0, 30.0, 30.0), 2)];
        assert!(sample_polygons(&image, &bands, &regions).unwrap().is_empty());
    }
}
