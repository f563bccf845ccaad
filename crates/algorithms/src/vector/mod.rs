//! Vector helpers for regions of interest
//!
//! - Bounding box: axis-aligned envelope of points or geometries
//! - Centroid: geometric center
//! - Geometry mask: rasterize an area geometry onto a pixel grid

mod mask;
mod spatial;

pub use mask::{contains_point, geometry_mask};
pub use spatial::{bounding_box, centroid, BoundingBox};
