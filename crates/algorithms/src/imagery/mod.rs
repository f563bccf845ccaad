//! Imagery algorithms for multispectral scenes
//!
//! - Cloud mask: QA60 cloud/cirrus bit masking with reflectance scaling
//! - Indices: NDVI, NDTI, PGI, PMLI, RPGI and the generic normalized difference
//! - Composite: per-pixel, per-band median over a scene stack

mod cloud_mask;
mod composite;
mod indices;

pub use cloud_mask::{cloud_mask, CloudMaskParams};
pub use composite::median_composite;
pub use indices::{
    add_plastic_indices, ndti, ndvi, normalized_difference, pgi, pmli, rpgi, IndexBand,
};

/// Sentinel-2 band identifiers used by the index formulas.
pub mod sentinel2 {
    pub const BLUE: &str = "B2";
    pub const GREEN: &str = "B3";
    pub const RED: &str = "B4";
    pub const RED_EDGE_2: &str = "B6";
    pub const NIR: &str = "B8";
    pub const SWIR1: &str = "B11";
    pub const SWIR2: &str = "B12";
    /// Quality-assurance bitmask band
    pub const QA: &str = "QA60";

    /// Reflectance bands read from every scene
    pub const REFLECTANCE: [&str; 7] = [BLUE, GREEN, RED, RED_EDGE_2, NIR, SWIR1, SWIR2];
}
