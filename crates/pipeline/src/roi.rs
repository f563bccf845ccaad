//! Regions of interest and the administrative boundary catalog

use std::fmt;
use std::path::Path;

use agriplast_algorithms::vector::{bounding_box, centroid, geometry_mask, BoundingBox};
use agriplast_core::vector::{AttributeValue, FeatureCollection};
use agriplast_core::GeoTransform;
use geo::{CoordsIter, Geometry, MultiPolygon, Polygon};
use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::ground_truth::LabeledPoint;

/// Spatial extent that bounds imagery search and clipping
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOfInterest {
    /// Rectangle inferred from label extents
    Bounds(BoundingBox),
    /// Named boundary polygon
    Boundary { name: String, geometry: Geometry<f64> },
}

impl RegionOfInterest {
    /// Bounding rectangle of `points`, or `None` when there are none.
    pub fn from_points(points: &[LabeledPoint]) -> Option<Self> {
        BoundingBox::from_points(points.iter().map(|p| (p.longitude, p.latitude))).map(Self::Bounds)
    }

    pub fn boundary(name: impl Into<String>, geometry: Geometry<f64>) -> Self {
        Self::Boundary {
            name: name.into(),
            geometry,
        }
    }

    /// Envelope used for the archive footprint search.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            Self::Bounds(bb) => Some(*bb),
            Self::Boundary { geometry, .. } => bounding_box(geometry),
        }
    }

    pub fn geometry(&self) -> Geometry<f64> {
        match self {
            Self::Bounds(bb) => Geometry::Polygon(bb.to_polygon()),
            Self::Boundary { geometry, .. } => geometry.clone(),
        }
    }

    /// Stable identity string used in cache keys.
    ///
    /// Boundaries are identified by name and a digest of their vertices, so
    /// two files sharing a stem but not a shape never collide.
    pub fn identity(&self) -> String {
        match self {
            Self::Bounds(bb) => format!(
                "bounds:{},{},{},{}",
                bb.min_x, bb.min_y, bb.max_x, bb.max_y
            ),
            Self::Boundary { name, geometry } => {
                format!("boundary:{name}#{}", geometry_digest(geometry))
            }
        }
    }

    /// Pixels of a `rows x cols` grid that belong to the region.
    ///
    /// A rectangle keeps every pixel whose footprint touches it, so points on
    /// its edges keep their pixels. A boundary keeps pixels whose centers it
    /// contains.
    pub fn clip_mask(&self, rows: usize, cols: usize, transform: &GeoTransform) -> Array2<bool> {
        match self {
            Self::Bounds(bb) => Array2::from_shape_fn((rows, cols), |(row, col)| {
                let x0 = transform.origin_x + col as f64 * transform.pixel_width;
                let x1 = x0 + transform.pixel_width;
                let y0 = transform.origin_y + row as f64 * transform.pixel_height;
                let y1 = y0 + transform.pixel_height;
                let cell = BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1));
                cell.intersects(bb)
            }),
            Self::Boundary { geometry, .. } => geometry_mask(geometry, rows, cols, transform),
        }
    }
}

impl fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounds(bb) => write!(
                f,
                "[{:.4}, {:.4}, {:.4}, {:.4}]",
                bb.min_x, bb.min_y, bb.max_x, bb.max_y
            ),
            Self::Boundary { name, .. } => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Boundary catalog
// ---------------------------------------------------------------------------

/// First 16 hex digits of a blake3 digest over the vertex coordinates
fn geometry_digest(geometry: &Geometry<f64>) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in geometry.coords_iter() {
        hasher.update(&c.x.to_le_bytes());
        hasher.update(&c.y.to_le_bytes());
    }
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

/// Named administrative boundaries (e.g. counties) for inference regions
#[derive(Debug, Clone, Default)]
pub struct BoundaryCatalog {
    boundaries: Vec<(String, MultiPolygon<f64>)>,
}

impl BoundaryCatalog {
    /// Build from features carrying a `NAME` property, keeping only those
    /// whose `STATEFP` equals `state_fp` when given. Features sharing a
    /// name are merged.
    pub fn from_features(features: &FeatureCollection, state_fp: Option<&str>) -> Self {
        let mut catalog = Self::default();
        for feature in features.iter() {
            let Some(name) = feature.get_property("NAME").and_then(AttributeValue::as_str) else {
                continue;
            };
            if let Some(fp) = state_fp {
                let matches = match feature.get_property("STATEFP") {
                    Some(AttributeValue::String(s)) => s == fp,
                    Some(v) => v.as_i64().is_some_and(|n| fp.parse::<i64>() == Ok(n)),
                    None => false,
                };
                if !matches {
                    continue;
                }
            }
            let polygons: Vec<Polygon<f64>> = match &feature.geometry {
                Some(Geometry::Polygon(p)) => vec![p.clone()],
                Some(Geometry::MultiPolygon(mp)) => mp.0.clone(),
                _ => continue,
            };
            catalog.insert(name, polygons);
        }
        catalog
    }

    /// Load from a GeoJSON FeatureCollection file.
    pub fn from_geojson_file(path: impl AsRef<Path>, state_fp: Option<&str>) -> Result<Self> {
        let fc = FeatureCollection::from_geojson_file(path)?;
        Ok(Self::from_features(&fc, state_fp))
    }

    fn insert(&mut self, name: &str, polygons: Vec<Polygon<f64>>) {
        match self.boundaries.iter_mut().find(|(n, _)| n == name) {
            Some((_, mp)) => mp.0.extend(polygons),
            None => self.boundaries.push((name.to_string(), MultiPolygon(polygons))),
        }
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Boundary names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.boundaries.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Region for `name`.
    pub fn lookup(&self, name: &str) -> Result<RegionOfInterest> {
        self.boundaries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, mp)| RegionOfInterest::boundary(n.clone(), Geometry::MultiPolygon(mp.clone())))
            .ok_or_else(|| PipelineError::input("boundaries", format!("unknown region '{name}'")))
    }

    /// Centroid `(x, y)` of the named boundary.
    pub fn centroid(&self, name: &str) -> Result<(f64, f64)> {
        let roi = self.lookup(name)?;
        centroid(&roi.geometry())
            .map(|p| (p.x(), p.y()))
            .ok_or_else(|| PipelineError::input("boundaries", format!("region '{name}' has no area")))
    }
}
