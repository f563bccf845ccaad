//! The imagery backend contract

use agriplast_algorithms::imagery::median_composite;
use agriplast_algorithms::sampling::{self, LabeledGeometry, SampledPixel};
use agriplast_core::{BandSet, MultiBandImage};

use crate::error::Result;
use crate::models::{SceneItem, SceneQuery};

/// A searchable archive of multispectral scenes.
///
/// Implementors provide scene search and loading. Compositing and sampling
/// have default implementations (per-pixel median, pixel-center sampling)
/// that a remote service may replace with its own.
///
/// Every call blocks until the archive answers. Failures are returned as-is;
/// nothing here retries.
pub trait ImageryBackend {
    /// Short human-readable name, used in logs
    fn name(&self) -> &str;

    /// Scenes matching `query`, oldest first.
    fn search(&self, query: &SceneQuery) -> Result<Vec<SceneItem>>;

    /// Load the requested bands of one scene onto a common grid.
    ///
    /// Values are raw digital numbers as stored in the archive.
    fn load(&self, item: &SceneItem, bands: &[&str]) -> Result<MultiBandImage>;

    /// Reduce co-registered scenes to their per-pixel median.
    fn composite(&self, images: &[MultiBandImage]) -> Result<MultiBandImage> {
        Ok(median_composite(images)?)
    }

    /// Extract labeled feature rows from `image` over `bands`.
    fn sample(
        &self,
        image: &MultiBandImage,
        bands: &BandSet,
        geometries: &[LabeledGeometry],
    ) -> Result<Vec<SampledPixel>> {
        Ok(sampling::sample(image, bands, geometries)?)
    }
}

impl<B: ImageryBackend + ?Sized> ImageryBackend for &B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn search(&self, query: &SceneQuery) -> Result<Vec<SceneItem>> {
        (**self).search(query)
    }

    fn load(&self, item: &SceneItem, bands: &[&str]) -> Result<MultiBandImage> {
        (**self).load(item, bands)
    }

    fn composite(&self, images: &[MultiBandImage]) -> Result<MultiBandImage> {
        (**self).composite(images)
    }

    fn sample(
        &self,
        image: &MultiBandImage,
        bands: &BandSet,
        geometries: &[LabeledGeometry],
    ) -> Result<Vec<SampledPixel>> {
        (**self).sample(image, bands, geometries)
    }
}
