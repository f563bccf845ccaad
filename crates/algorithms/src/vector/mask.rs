//! Rasterize area geometries onto a pixel grid

use geo::{Contains, Geometry, Point};
use ndarray::Array2;
use crate::maybe_rayon::*;
use agriplast_core::GeoTransform;

use super::spatial::bounding_box;

/// Whether `geom` contains the point `(x, y)`.
///
/// Only polygonal geometries enclose area; anything else contains nothing.
pub fn contains_point(geom: &Geometry<f64>, x: f64, y: f64) -> bool {
    let p = Point::new(x, y);
    match geom {
        Geometry::Polygon(poly) => poly.contains(&p),
        Geometry::MultiPolygon(mp) => mp.contains(&p),
        Geometry::Rect(r) => r.contains(&p),
        Geometry::GeometryCollection(gc) => gc.0.iter().any(|g| contains_point(g, x, y)),
        _ => false,
    }
}

/// Boolean mask of the pixels whose centers fall inside `geom`.
///
/// The grid is `rows x cols` with the given transform.
pub fn geometry_mask(
    geom: &Geometry<f64>,
    rows: usize,
    cols: usize,
    transform: &GeoTransform,
) -> Array2<bool> {
    let Some(bb) = bounding_box(geom) else {
        return Array2::from_elem((rows, cols), false);
    };

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![false; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                let (x, y) = transform.pixel_to_geo(col, row);
                if bb.contains_point(x, y) {
                    *cell = contains_point(geom, x, y);
                }
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data)
        .unwrap_or_else(|_| Array2::from_elem((rows, cols), false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    fn square(min: f64, max: f64) -> Geometry<f64> {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![(min, min), (max, min), (max, max), (min, max), (min, min)]),
            vec![],
        ))
    }

    #[test]
    fn test_mask_marks_interior_centers() {
        // 10x10 grid of unit cells, origin top-left at (0, 10)
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let mask = geometry_mask(&square(2.0, 5.0), 10, 10, &gt);

        // centers at x = 2.5, 3.5, 4.5 and y = 2.5, 3.5, 4.5
        assert_eq!(mask.iter().filter(|&&m| m).count(), 9);
        // row 7 -> y = 2.5, col 2 -> x = 2.5
        assert!(mask[(7, 2)]);
        assert!(!mask[(0, 0)]);
    }

    #[test]
    fn test_mask_outside_grid_is_empty() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let mask = geometry_mask(&square(50.0, 60.0), 10, 10, &gt);
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_point_geometry_contains_nothing() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let mask = geometry_mask(&Geometry::Point(Point::new(3.5, 3.5)), 10, 10, &gt);
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_contains_point() {
        let g = square(0.0, 1.0);
        assert!(contains_point(&g, 0.5, 0.5));
        assert!(!contains_point(&g, 1.5, 0.5));
    }
}
