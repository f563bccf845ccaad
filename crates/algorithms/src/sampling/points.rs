//! Point-mode sampling

use agriplast_core::{BandSet, MultiBandImage, Result};
use geo::Geometry;
use tracing::debug;

use super::{LabeledGeometry, SampledPixel};

/// Sample the pixel under each labeled point.
///
/// Points outside the grid, or over a pixel with no-data in any band of
/// `bands`, are dropped. Non-point geometries are ignored.
pub fn sample_points(
    image: &MultiBandImage,
    bands: &BandSet,
    points: &[LabeledGeometry],
) -> Result<Vec<SampledPixel>> {
    // a missing band must fail even when no point lands on the grid
    for name in bands.iter() {
        image.band(name)?;
    }

    let (rows, cols) = image.shape();
    let transform = image.transform();
    let mut out = Vec::with_capacity(points.len());
    let mut dropped = 0usize;

    for labeled in points {
        let Geometry::Point(p) = &labeled.geometry else {
            continue;
        };
        let Some((row, col)) = transform.pixel_index(p.x(), p.y(), rows, cols) else {
            dropped += 1;
            continue;
        };
        match image.pixel(row, col, bands)? {
            Some(features) => {
                let (x, y) = transform.pixel_to_geo(col, row);
                out.push(SampledPixel {
                    features,
                    class: labeled.class,
                    x,
                    y,
                });
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, kept = out.len(), "points without valid pixels dropped");
    }
    Ok(out)
}
