//! Classifier training and prediction

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use agriplast_algorithms::classification::{ConfusionMatrix, RandomForest, RandomForestParams};
use agriplast_core::{BandSet, Raster};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compositor::{CompositeImage, CompositeKey};
use crate::config::validate_forest_size;
use crate::error::{PipelineError, Result};
use crate::feature_table::{FeatureTable, TableId};

/// Everything that determines a trained model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub table: TableId,
    pub forest_size: usize,
    pub bands: BandSet,
}

/// Trains a model from a feature table.
pub trait ClassifierTrainer {
    fn train(&self, table: &FeatureTable, forest_size: usize) -> Result<TrainedModel>;
}

/// Random-forest trainer; `params.n_trees` is replaced by the forest size.
#[derive(Debug, Clone, Default)]
pub struct RandomForestTrainer {
    pub params: RandomForestParams,
}

impl RandomForestTrainer {
    pub fn seeded(seed: u64) -> Self {
        Self {
            params: RandomForestParams {
                seed,
                ..Default::default()
            },
        }
    }
}

impl ClassifierTrainer for RandomForestTrainer {
    fn train(&self, table: &FeatureTable, forest_size: usize) -> Result<TrainedModel> {
        validate_forest_size(forest_size)?;
        if table.is_empty() {
            return Err(PipelineError::input("training set", "no feature rows to train on"));
        }
        let features = table.features();
        let labels = table.labels();
        let params = RandomForestParams {
            n_trees: forest_size,
            ..self.params.clone()
        };
        let forest = RandomForest::fit(&features, &labels, &params)?;

        // resubstitution accuracy over the training rows
        let predicted = forest.predict_batch(&features)?;
        let confusion = ConfusionMatrix::from_predictions(&labels, &predicted)?;
        info!(
            trees = forest_size,
            rows = table.len(),
            accuracy = confusion.accuracy(),
            "model trained"
        );
        info!("confusion matrix: {confusion}");

        Ok(TrainedModel {
            key: ModelKey {
                table: table.fingerprint(),
                forest_size,
                bands: table.bands().clone(),
            },
            forest,
            confusion,
        })
    }
}

/// A trained forest with the band set it must be applied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    key: ModelKey,
    forest: RandomForest,
    confusion: ConfusionMatrix,
}

impl TrainedModel {
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn bands(&self) -> &BandSet {
        &self.key.bands
    }

    pub fn forest_size(&self) -> usize {
        self.key.forest_size
    }

    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    pub fn accuracy(&self) -> f64 {
        self.confusion.accuracy()
    }

    /// Classify a composite over the model's band set.
    ///
    /// # Errors
    /// Fails if the composite lacks one of the model's bands.
    pub fn predict(&self, composite: &CompositeImage) -> Result<ClassifiedRaster> {
        let raster = self.forest.classify(&composite.image, &self.key.bands)?;
        let out = ClassifiedRaster {
            raster,
            model: self.key.clone(),
            composite: composite.key.clone(),
            confusion: self.confusion.clone(),
        };
        info!(
            composite = %composite.key,
            classes = ?out.class_counts(),
            accuracy = self.accuracy(),
            "classified"
        );
        Ok(out)
    }

    /// Write as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self).map_err(std::io::Error::from)?;
        Ok(())
    }

    /// Read a model written by [`TrainedModel::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| PipelineError::input(path.display().to_string(), e.to_string()))
    }
}

/// Per-pixel class codes (NaN outside the region or under cloud)
#[derive(Debug, Clone)]
pub struct ClassifiedRaster {
    pub raster: Raster<f64>,
    pub model: ModelKey,
    pub composite: CompositeKey,
    /// Resubstitution confusion matrix of the model
    pub confusion: ConfusionMatrix,
}

impl ClassifiedRaster {
    /// Pixel count per class code
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for &v in self.raster.data().iter() {
            if v.is_finite() {
                *counts.entry(v as u32).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use super::*;
    use agriplast_algorithms::sampling::SampledPixel;

    fn table() -> FeatureTable {
        let mut t = FeatureTable::new(BandSet::new(["B4", "B8"]).unwrap());
        let mut samples = Vec::new();
        for i in 0..30 {
            let class = (i % 3) as u32;
            let base = class as f64;
            samples.push(SampledPixel {
                features: vec![base + 0.01 * i as f64, 2.0 * base],
                class,
                x: 0.0,
                y: 0.0,
            });
        }
        t.extend_samples(samples);
        t
    }

    #[test]
    fn test_train_reports_confusion() {
        let model = RandomForestTrainer::default().train(&table(), 10).unwrap();
        assert_eq!(model.forest_size(), 10);
        assert_eq!(model.confusion().size(), 3);
        assert_relative_eq!(model.accuracy(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_forest_size_checked() {
        let trainer = RandomForestTrainer::default();
        assert!(trainer.train(&table(), 0).is_err());
        assert!(trainer.train(&table(), 101).is_err());
    }

    #[test]
    fn test_empty_table_is_input_error() {
        let empty = FeatureTable::new(BandSet::new(["B4"]).unwrap());
        let err = RandomForestTrainer::default().train(&empty, 5).unwrap_err();
        assert!(matches!(err, PipelineError::InputData { .. }));
    }

    #[test]
    fn test_key_tracks_table_and_size() {
        let trainer = RandomForestTrainer::default();
        let a = trainer.train(&table(), 5).unwrap();
        let b = trainer.train(&table(), 6).unwrap();
        assert_eq!(a.key().table, b.key().table);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = RandomForestTrainer::default().train(&table(), 4).unwrap();
        model.save(&path).unwrap();
        let loaded = TrainedModel::load(&path).unwrap();
        assert_eq!(loaded.key(), model.key());
        assert_eq!(loaded.confusion(), model.confusion());
    }
}
