//! # Agriplast Core
//!
//! Core types and I/O shared by the agriplast crates.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System tag
//! - `MultiBandImage` / `BandSet`: named band stacks and the ordered band
//!   lists a classifier is trained and applied on
//! - Vector features parsed from GeoJSON
//! - GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod image;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use image::{BandSet, MultiBandImage};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::image::{BandSet, MultiBandImage};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
}
