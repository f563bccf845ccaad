//! Envelopes and centroids of sample sites and regions

use geo::{BoundingRect, Centroid, Geometry, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Axis-aligned envelope in geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Envelope of a set of sample coordinates.
    ///
    /// `None` when the set is empty or holds a non-finite coordinate. A
    /// single site gives a zero-area box, which still intersects the
    /// footprints that contain it.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().try_fold(None, |acc: Option<Self>, (x, y)| {
            if !(x.is_finite() && y.is_finite()) {
                return Err(());
            }
            Ok(Some(match acc {
                None => Self::new(x, y, x, y),
                Some(b) => Self::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
            }))
        })
        .ok()
        .flatten()
    }

    /// Closed test, edges included
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// True when the boxes share at least one point, edges included
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Counter-clockwise closed ring starting at the lower-left corner
    pub fn to_polygon(&self) -> Polygon<f64> {
        let ring = LineString::from(vec![
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
            (self.min_x, self.min_y),
        ]);
        Polygon::new(ring, vec![])
    }
}

/// Envelope of a geometry, `None` for empty geometries
pub fn bounding_box(geom: &Geometry<f64>) -> Option<BoundingBox> {
    let rect = geom.bounding_rect()?;
    Some(BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
}

/// Area-weighted centroid of a region, `None` when it has no area to weigh
pub fn centroid(geom: &Geometry<f64>) -> Option<Point<f64>> {
    match geom {
        Geometry::Polygon(p) => p.centroid(),
        Geometry::MultiPolygon(mp) => mp.centroid(),
        Geometry::Rect(r) => Some(r.centroid()),
        Geometry::GeometryCollection(gc) => gc.centroid(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, MultiPolygon};

    fn field(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        BoundingBox::new(x0, y0, x0 + size, y0 + size).to_polygon()
    }

    #[test]
    fn test_envelope_of_sites() {
        let bb = BoundingBox::from_points([(-118.2, 34.1), (-118.5, 33.9), (-118.3, 34.0)]).unwrap();
        assert_eq!(bb.as_tuple(), (-118.5, 33.9, -118.2, 34.1));
    }

    #[test]
    fn test_envelope_rejects_empty_and_nan() {
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
        assert!(BoundingBox::from_points([(0.0, 0.0), (f64::NAN, 1.0)]).is_none());
    }

    #[test]
    fn test_single_site_still_intersects() {
        let site = BoundingBox::from_points([(1.0, 2.0)]).unwrap();
        let footprint = BoundingBox::new(0.0, 0.0, 5.0, 5.0);
        assert!(site.intersects(&footprint));
        assert!(footprint.contains_point(1.0, 2.0));
        assert!(!BoundingBox::new(3.0, 3.0, 4.0, 4.0).intersects(&site));
    }

    #[test]
    fn test_touching_edges_intersect() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(1.0, 0.0, 2.0, 1.0);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_bounding_box_of_multipolygon() {
        let mp = MultiPolygon(vec![field(0.0, 0.0, 1.0), field(4.0, 2.0, 1.0)]);
        let bb = bounding_box(&Geometry::MultiPolygon(mp)).unwrap();
        assert_eq!(bb.as_tuple(), (0.0, 0.0, 5.0, 3.0));
    }

    #[test]
    fn test_polygon_ring_closed() {
        let poly = BoundingBox::new(1.0, 2.0, 5.0, 8.0).to_polygon();
        let coords = &poly.exterior().0;
        assert_eq!(coords.len(), 5);
        assert_eq!(coords[0], Coord { x: 1.0, y: 2.0 });
        assert_eq!(coords[0], coords[4]);
    }

    #[test]
    fn test_centroid_weighs_area() {
        // 2x2 at the origin and a 1x1 far right: pulled towards the larger one
        let mp = MultiPolygon(vec![field(0.0, 0.0, 2.0), field(10.0, 0.0, 1.0)]);
        let c = centroid(&Geometry::MultiPolygon(mp)).unwrap();
        let expected = (4.0 * 1.0 + 1.0 * 10.5) / 5.0;
        assert!((c.x() - expected).abs() < 1e-10);
    }

    #[test]
    fn test_centroid_needs_area() {
        assert!(centroid(&Geometry::Point(Point::new(3.0, 7.0))).is_none());
    }
}
