//! In-memory scene archive

use std::sync::atomic::{AtomicUsize, Ordering};

use agriplast_core::MultiBandImage;

use crate::backend::ImageryBackend;
use crate::error::{ArchiveError, Result};
use crate::models::{SceneItem, SceneQuery};

/// Scenes held in memory. Counts calls so callers can check how often the
/// archive was actually consulted.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    scenes: Vec<(SceneItem, MultiBandImage)>,
    searches: AtomicUsize,
    loads: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene; the footprint defaults to the image bounds.
    pub fn insert(&mut self, mut item: SceneItem, image: MultiBandImage) {
        if item.bbox.is_none() {
            let (w, s, e, n) = image.bounds();
            item.bbox = Some(vec![w, s, e, n]);
        }
        self.scenes.retain(|(i, _)| i.id != item.id);
        self.scenes.push((item, image));
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Number of `search` calls so far
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    /// Number of `load` calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl ImageryBackend for MemoryArchive {
    fn name(&self) -> &str {
        "memory"
    }

    fn search(&self, query: &SceneQuery) -> Result<Vec<SceneItem>> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let mut items: Vec<SceneItem> = self
            .scenes
            .iter()
            .map(|(item, _)| item)
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.date(), item.id.clone()));
        Ok(items)
    }

    fn load(&self, item: &SceneItem, bands: &[&str]) -> Result<MultiBandImage> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let (stored, image) = self
            .scenes
            .iter()
            .find(|(i, _)| i.id == item.id)
            .ok_or_else(|| ArchiveError::UnknownScene(item.id.clone()))?;

        let mut layers = Vec::with_capacity(bands.len());
        for &band in bands {
            let raster = image.band(band).map_err(|_| ArchiveError::MissingAsset {
                item: stored.id.clone(),
                band: band.to_string(),
            })?;
            layers.push((band, raster.clone()));
        }
        Ok(MultiBandImage::from_bands(layers)?)
    }
}
