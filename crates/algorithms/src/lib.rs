//! # Agriplast Algorithms
//!
//! Raster algorithms behind the plastic-cover classification pipeline.
//!
//! ## Algorithm Categories
//!
//! - **imagery**: QA60 cloud masking, spectral/plastic indices, median compositing
//! - **sampling**: labeled feature extraction at points and inside polygons
//! - **classification**: random forest with resubstitution confusion matrix
//! - **vector**: bounding boxes and geometry masks on raster grids

pub mod classification;
pub mod imagery;
pub mod sampling;
pub mod vector;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{ConfusionMatrix, RandomForest, RandomForestParams};
    pub use crate::imagery::{
        add_plastic_indices, cloud_mask, median_composite, ndti, ndvi, normalized_difference,
        pgi, pmli, rpgi, CloudMaskParams, IndexBand,
    };
    pub use crate::sampling::{sample, sample_points, sample_polygons, LabeledGeometry, SampledPixel};
    pub use crate::vector::{geometry_mask, BoundingBox};
    pub use agriplast_core::prelude::*;
}
