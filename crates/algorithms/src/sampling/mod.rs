//! Ground-truth sampling
//!
//! Extracts per-pixel feature vectors from a composite at labeled points or
//! inside labeled polygons. Pixels with no-data in any requested band are
//! dropped, never filled.

mod points;
mod polygons;

pub use points::sample_points;
pub use polygons::sample_polygons;

use agriplast_core::{BandSet, MultiBandImage, Result};
use geo::Geometry;
use serde::{Deserialize, Serialize};

/// A geometry paired with the class code its pixels are labeled with
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledGeometry {
    pub geometry: Geometry<f64>,
    pub class: u32,
}

impl LabeledGeometry {
    pub fn new(geometry: impl Into<Geometry<f64>>, class: u32) -> Self {
        Self {
            geometry: geometry.into(),
            class,
        }
    }

    /// Labeled point at `(x, y)`
    pub fn point(x: f64, y: f64, class: u32) -> Self {
        Self::new(geo::Point::new(x, y), class)
    }

    fn is_point(&self) -> bool {
        matches!(self.geometry, Geometry::Point(_))
    }
}

/// One sampled pixel: its feature vector over a [`BandSet`] and its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledPixel {
    /// Values in band-set order; always finite
    pub features: Vec<f64>,
    pub class: u32,
    /// Pixel-center coordinates
    pub x: f64,
    pub y: f64,
}

/// Sample `image` at every geometry: points by the pixel they fall in,
/// polygons by every pixel center they contain.
///
/// Geometries that are neither points nor polygons contribute nothing.
pub fn sample(
    image: &MultiBandImage,
    bands: &BandSet,
    geometries: &[LabeledGeometry],
) -> Result<Vec<SampledPixel>> {
    let (points, areas): (Vec<_>, Vec<_>) =
        geometries.iter().cloned().partition(LabeledGeometry::is_point);

    let mut rows = sample_points(image, bands, &points)?;
    rows.extend(sample_polygons(image, bands, &areas)?);
    Ok(rows)
}


#[cfg(test)]
mod tests {
    use super::test_support::grid_scene;
    use super::*;
    use geo::{LineString, Polygon};

    #[test]
    fn test_mixed_geometries() {
        let image = grid_scene();
        let bands = BandSet::new(["A", "B"]).unwrap();
        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        );
        let geoms = vec![
            LabeledGeometry::point(5.5, 5.5, 1),
            LabeledGeometry::new(square, 2),
        ];

        let rows = sample(&image, &bands, &geoms).unwrap();
        assert_eq!(rows.len(), 1 + 4);
        assert_eq!(rows.iter().filter(|r| r.class == 2).count(), 4);
        assert!(rows.iter().all(|r| r.features.iter().all(|v| v.is_finite())));
    }
}
