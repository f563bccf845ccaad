//! On-disk scene archive: a `catalog.json` plus one GeoTIFF per band

use std::fs;
use std::path::{Path, PathBuf};

use agriplast_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use agriplast_core::MultiBandImage;
use tracing::{debug, info};

use crate::backend::ImageryBackend;
use crate::error::{ArchiveError, Result};
use crate::models::{SceneAsset, SceneCatalog, SceneItem, SceneQuery};

/// File name of the catalog inside the archive root
pub const CATALOG_FILE: &str = "catalog.json";

/// A scene archive rooted at a directory.
///
/// Asset hrefs are resolved against the root unless absolute. All bands of a
/// scene must share one grid; scenes of one collection are expected to share
/// it too so they can be composited.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    root: PathBuf,
    catalog: SceneCatalog,
}

impl LocalArchive {
    /// Open an existing archive.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let path = root.join(CATALOG_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            ArchiveError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let catalog: SceneCatalog = serde_json::from_str(&text)?;
        info!(root = %root.display(), scenes = catalog.len(), "opened scene archive");
        Ok(Self { root, catalog })
    }

    /// Start an empty archive at `root`, creating the directory.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let archive = Self {
            root,
            catalog: SceneCatalog::new(),
        };
        archive.save()?;
        Ok(archive)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    /// Write every band of `image` as `scenes/<id>/<band>.tif` and register
    /// the scene under `item`, replacing any scene with the same id.
    pub fn add_scene(&mut self, mut item: SceneItem, image: &MultiBandImage) -> Result<SceneItem> {
        let dir = Path::new("scenes").join(&item.id);
        fs::create_dir_all(self.root.join(&dir))?;

        for (band, raster) in image.bands() {
            let rel = dir.join(format!("{band}.tif"));
            write_geotiff(
                raster,
                self.root.join(&rel),
                Some(GeoTiffOptions {
                    nodata: raster.nodata(),
                }),
            )?;
            let href = rel.to_string_lossy().replace('\\', "/");
            item.assets.insert(band.to_string(), SceneAsset::geotiff(href));
        }
        if item.bbox.is_none() {
            let (w, s, e, n) = image.bounds();
            item.bbox = Some(vec![w, s, e, n]);
        }

        self.catalog.features.retain(|f| f.id != item.id);
        self.catalog.features.push(item.clone());
        self.save()?;
        debug!(id = %item.id, bands = image.band_count(), "scene added");
        Ok(item)
    }

    /// Persist the catalog.
    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.catalog)?;
        fs::write(self.root.join(CATALOG_FILE), text)?;
        Ok(())
    }

    fn resolve(&self, href: &str) -> PathBuf {
        let p = Path::new(href);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl ImageryBackend for LocalArchive {
    fn name(&self) -> &str {
        "local"
    }

    fn search(&self, query: &SceneQuery) -> Result<Vec<SceneItem>> {
        let mut items: Vec<SceneItem> = self
            .catalog
            .features
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.date(), item.id.clone()));
        debug!(
            collection = %query.collection,
            window = %query.datetime(),
            found = items.len(),
            "archive search"
        );
        Ok(items)
    }

    fn load(&self, item: &SceneItem, bands: &[&str]) -> Result<MultiBandImage> {
        let mut layers = Vec::with_capacity(bands.len());
        for &band in bands {
            let asset = item.asset(band).ok_or_else(|| ArchiveError::MissingAsset {
                item: item.id.clone(),
                band: band.to_string(),
            })?;
            let raster = read_geotiff::<f64, _>(self.resolve(&asset.href))?;
            layers.push((band, raster));
        }
        if layers.is_empty() {
            return Err(ArchiveError::InvalidItem {
                id: item.id.clone(),
                reason: "no bands requested".into(),
            });
        }
        Ok(MultiBandImage::from_bands(layers)?)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use super::*;
    use agriplast_core::{GeoTransform, Raster};
    use chrono::NaiveDate;

    fn image(value: f64) -> MultiBandImage {
        let gt = GeoTransform::new(-118.5, 34.3, 0.01, -0.01);
        let mut b4 = Raster::filled(5, 5, value);
        b4.set_transform(gt);
        let mut qa = Raster::filled(5, 5, 0.0);
        qa.set_transform(gt);
        MultiBandImage::from_bands([("B4", b4), ("QA60", qa)]).unwrap()
    }

    #[test]
    fn add_and_reload_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = LocalArchive::create(dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2019, 3, 10).unwrap();
        let item = SceneItem::new("s1", "C", date).with_cloud_cover(5.0);
        archive.add_scene(item, &image(1200.0)).unwrap();

        let reopened = LocalArchive::open(dir.path()).unwrap();
        assert_eq!(reopened.catalog().len(), 1);
        let item = &reopened.catalog().features[0];
        assert!(item.footprint().is_some());

        let loaded = reopened.load(item, &["B4", "QA60"]).unwrap();
        assert_eq!(loaded.shape(), (5, 5));
        assert_relative_eq!(loaded.band("B4").unwrap().get(2, 2).unwrap(), 1200.0, epsilon = 1e-3);
    }

    #[test]
    fn load_missing_band_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = LocalArchive::create(dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2019, 3, 10).unwrap();
        let item = archive
            .add_scene(SceneItem::new("s1", "C", date), &image(1.0))
            .unwrap();
        assert!(matches!(
            archive.load(&item, &["B8"]),
            Err(ArchiveError::MissingAsset { .. })
        ));
    }

    #[test]
    fn open_without_catalog_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalArchive::open(dir.path()),
            Err(ArchiveError::Unavailable(_))
        ));
    }
}
