//! Cloud-free temporal composites
//!
//! Compositing runs in two phases. [`TemporalCompositor::request`] builds a
//! [`CompositeRequest`] without touching the archive; its [`CompositeKey`]
//! can be looked up in a cache first. [`CompositeRequest::evaluate`] then
//! searches, loads, masks and reduces the scenes.

use std::fmt;

use agriplast_algorithms::imagery::{
    add_plastic_indices, cloud_mask, sentinel2, CloudMaskParams, IndexBand,
};
use agriplast_archive::{ImageryBackend, SceneQuery};
use agriplast_core::MultiBandImage;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::roi::RegionOfInterest;
use crate::window::DateWindow;

/// Identity of a composite: same key, same pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub collection: String,
    pub roi: String,
    pub window: DateWindow,
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.collection, self.roi, self.window)
    }
}

/// Median composite of the clear-sky scenes over one region and window.
///
/// Carries the scaled reflectance bands, `QA60`, and every plastic index.
/// Pixels outside the region are NaN.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub image: MultiBandImage,
    pub key: CompositeKey,
    /// Scenes that went into the median, oldest first
    pub scene_ids: Vec<String>,
}

impl CompositeImage {
    /// Number of pixels with at least one finite reflectance value
    pub fn valid_pixels(&self) -> usize {
        count_valid(&self.image)
    }
}

fn count_valid(image: &MultiBandImage) -> usize {
    let bands: Vec<_> = sentinel2::REFLECTANCE
        .iter()
        .filter_map(|name| image.band(name).ok())
        .collect();
    let (rows, cols) = image.shape();
    let mut n = 0;
    for row in 0..rows {
        for col in 0..cols {
            let valid = bands.iter().any(|band| {
                let v = unsafe { band.get_unchecked(row, col) };
                !band.is_nodata(v)
            });
            if valid {
                n += 1;
            }
        }
    }
    n
}

/// Builds composites for a collection with one cloud threshold.
#[derive(Debug, Clone)]
pub struct TemporalCompositor {
    pub collection: String,
    pub max_cloud_cover: f64,
    pub cloud: CloudMaskParams,
    pub indices: Vec<IndexBand>,
}

impl TemporalCompositor {
    pub fn new(collection: impl Into<String>, max_cloud_cover: f64) -> Self {
        Self {
            collection: collection.into(),
            max_cloud_cover,
            cloud: CloudMaskParams::default(),
            indices: IndexBand::ALL.to_vec(),
        }
    }

    /// Compositor over the training collection
    pub fn training(config: &PipelineConfig) -> Self {
        Self::new(config.collection.clone(), config.max_cloud_cover)
    }

    /// Compositor over the inference collection
    pub fn inference(config: &PipelineConfig) -> Self {
        Self::new(config.inference_collection.clone(), config.max_cloud_cover)
    }

    /// Describe a composite without querying the archive.
    ///
    /// # Errors
    /// Fails if the region has no extent.
    pub fn request(&self, roi: &RegionOfInterest, window: DateWindow) -> Result<CompositeRequest> {
        let bbox = roi.bbox().ok_or_else(|| {
            PipelineError::input(roi.to_string(), "region of interest has no extent")
        })?;
        let query = SceneQuery::new(&self.collection, bbox, window.start(), window.end())
            .max_cloud_cover(self.max_cloud_cover);
        Ok(CompositeRequest {
            query,
            roi: roi.clone(),
            window,
            cloud: self.cloud.clone(),
            indices: self.indices.clone(),
        })
    }

    /// Build and evaluate in one step.
    pub fn composite<B: ImageryBackend + ?Sized>(
        &self,
        backend: &B,
        roi: &RegionOfInterest,
        window: DateWindow,
    ) -> Result<CompositeImage> {
        self.request(roi, window)?.evaluate(backend)
    }
}

/// A composite that has been described but not yet computed
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub query: SceneQuery,
    pub roi: RegionOfInterest,
    pub window: DateWindow,
    cloud: CloudMaskParams,
    indices: Vec<IndexBand>,
}

impl CompositeRequest {
    pub fn key(&self) -> CompositeKey {
        CompositeKey {
            collection: self.query.collection.clone(),
            roi: self.roi.identity(),
            window: self.window,
        }
    }

    /// Bands loaded from each scene
    pub fn source_bands(&self) -> Vec<&str> {
        let mut bands = sentinel2::REFLECTANCE.to_vec();
        bands.push(self.cloud.qa_band.as_str());
        bands
    }

    fn empty(&self) -> PipelineError {
        PipelineError::EmptyComposite {
            collection: self.query.collection.clone(),
            roi: self.roi.to_string(),
            window: self.window.to_string(),
        }
    }

    /// Search, mask, reduce and clip.
    ///
    /// # Errors
    /// `EmptyComposite` when no scene qualifies or every pixel in the region
    /// is masked. Archive failures propagate unchanged.
    pub fn evaluate<B: ImageryBackend + ?Sized>(&self, backend: &B) -> Result<CompositeImage> {
        let items = backend.search(&self.query)?;
        if items.is_empty() {
            return Err(self.empty());
        }
        debug!(
            backend = backend.name(),
            scenes = items.len(),
            window = %self.window,
            "compositing"
        );

        let bands = self.source_bands();
        let mut scenes = Vec::with_capacity(items.len());
        for item in &items {
            let raw = backend.load(item, &bands)?;
            let mut clear = cloud_mask(&raw, &self.cloud)?;
            add_plastic_indices(&mut clear, &self.indices)?;
            scenes.push(clear);
        }

        let mut image = backend.composite(&scenes)?;
        let (rows, cols) = image.shape();
        let keep = self.roi.clip_mask(rows, cols, image.transform());
        image.mask(&keep)?;

        let valid = count_valid(&image);
        if valid == 0 {
            return Err(self.empty());
        }
        info!(
            collection = %self.query.collection,
            roi = %self.roi,
            window = %self.window,
            scenes = items.len(),
            valid_pixels = valid,
            "composite ready"
        );

        Ok(CompositeImage {
            image,
            key: self.key(),
            scene_ids: items.into_iter().map(|i| i.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{archive_with_scenes, date, field_bounds};

    #[test]
    fn test_request_does_not_touch_archive() {
        let archive = archive_with_scenes();
        let roi = RegionOfInterest::Bounds(field_bounds());
        let window = DateWindow::around(date(2019, 6, 1), 15).unwrap();
        let request = TemporalCompositor::training(&PipelineConfig::default())
            .request(&roi, window)
            .unwrap();

        assert_eq!(archive.search_count(), 0);
        assert_eq!(request.key().window, window);
        assert_eq!(request.key().roi, roi.identity());
    }

    #[test]
    fn test_composite_carries_indices_and_clips() {
        let archive = archive_with_scenes();
        let roi = RegionOfInterest::Bounds(field_bounds());
        let window = DateWindow::around(date(2019, 6, 1), 15).unwrap();
        let composite = TemporalCompositor::training(&PipelineConfig::default())
            .composite(&archive, &roi, window)
            .unwrap();

        for name in ["B2", "B12", "NDVI", "NDTI", "PGI", "PMLI", "RPGI"] {
            assert!(composite.image.has_band(name), "missing {name}");
        }
        let red = composite.image.band("B4").unwrap();
        assert!(red.get(0, 0).unwrap().is_finite());
        assert!((0.0..=1.0).contains(&red.get(0, 0).unwrap()));
        // scene grids extend past the field bounds
        assert!(red.get(9, 9).unwrap().is_nan());
        assert!(composite.valid_pixels() > 0);
    }

    #[test]
    fn test_cloudy_scenes_are_skipped() {
        let archive = archive_with_scenes();
        let roi = RegionOfInterest::Bounds(field_bounds());
        let window = DateWindow::around(date(2019, 6, 1), 15).unwrap();
        let composite = TemporalCompositor::training(&PipelineConfig::default())
            .composite(&archive, &roi, window)
            .unwrap();
        assert!(!composite.scene_ids.iter().any(|id| id.contains("cloudy")));
    }

    #[test]
    fn test_empty_window_is_empty_composite() {
        let archive = archive_with_scenes();
        let roi = RegionOfInterest::Bounds(field_bounds());
        let window = DateWindow::around(date(2015, 1, 1), 15).unwrap();
        let err = TemporalCompositor::training(&PipelineConfig::default())
            .composite(&archive, &roi, window)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyComposite { .. }));
    }
}
