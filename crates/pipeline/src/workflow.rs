//! Train-then-classify workflows
//!
//! Both workflows take the current parameters on every call and consult a
//! caller-owned [`PipelineCache`], so repeated calls with unchanged inputs
//! reuse the training set, model, composite and classification.

use std::sync::Arc;

use agriplast_archive::ImageryBackend;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::cache::{PipelineCache, TrainingKey};
use crate::classifier::{
    ClassifiedRaster, ClassifierTrainer, ModelKey, RandomForestTrainer, TrainedModel,
};
use crate::compositor::{CompositeImage, TemporalCompositor};
use crate::config::{validate_forest_size, PipelineConfig};
use crate::error::{PipelineError, Result, SourceFailure};
use crate::ground_truth::LabeledSource;
use crate::input::{check_sources, csv_path, load_polygon_group, read_point_csv_file};
use crate::roi::{BoundaryCatalog, RegionOfInterest};
use crate::training::{TrainingSet, TrainingSetBuilder};
use crate::window::DateWindow;

/// Where and when to classify
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    /// Boundary name; the configured default county when `None`
    pub region: Option<String>,
    /// One start date, or a start and an exclusive end
    pub dates: Vec<NaiveDate>,
}

impl InferenceRequest {
    pub fn new(region: Option<String>, dates: Vec<NaiveDate>) -> Self {
        Self { region, dates }
    }
}

/// Every artifact of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowOutput {
    pub training: Arc<TrainingSet>,
    pub model: Arc<TrainedModel>,
    pub composite: Arc<CompositeImage>,
    pub classified: Arc<ClassifiedRaster>,
}

/// Collaborators shared by both workflows
struct Session<'a, B: ImageryBackend + ?Sized> {
    backend: &'a B,
    config: &'a PipelineConfig,
    boundaries: &'a BoundaryCatalog,
    trainer: RandomForestTrainer,
}

impl<'a, B: ImageryBackend + ?Sized> Session<'a, B> {
    fn new(backend: &'a B, config: &'a PipelineConfig, boundaries: &'a BoundaryCatalog) -> Self {
        Self {
            backend,
            config,
            boundaries,
            trainer: RandomForestTrainer::seeded(config.split_seed),
        }
    }

    /// Window and region, resolved before the archive is consulted.
    fn resolve(&self, request: &InferenceRequest) -> Result<(DateWindow, RegionOfInterest)> {
        let window = DateWindow::from_inputs(&request.dates, self.config.inference_window_days)?;
        let name = request
            .region
            .as_deref()
            .unwrap_or(&self.config.default_county);
        let roi = self.boundaries.lookup(name)?;
        Ok((window, roi))
    }

    fn run<F>(
        &self,
        cache: &mut PipelineCache,
        training_key: TrainingKey,
        load_sources: F,
        forest_size: usize,
        request: &InferenceRequest,
    ) -> Result<WorkflowOutput>
    where
        F: FnOnce() -> Result<(Vec<LabeledSource>, Vec<SourceFailure>)>,
    {
        let (window, roi) = self.resolve(request)?;
        validate_forest_size(forest_size)?;

        let training = cache.training.get_or_try_insert_with(training_key, || {
            let (sources, unreadable) = load_sources()?;
            let mut set = TrainingSetBuilder::new(self.backend, self.config).build(&sources)?;
            set.failures.extend(unreadable);
            Ok(set)
        })?;
        for failure in &training.failures {
            warn!(
                source = %failure.source_name,
                error = %failure.error,
                "source did not contribute"
            );
        }
        if training.table.is_empty() {
            return Err(PipelineError::input(
                "training set",
                "no labeled pixels could be sampled",
            ));
        }

        let model_key = ModelKey {
            table: training.table.fingerprint(),
            forest_size,
            bands: training.table.bands().clone(),
        };
        let model = cache.models.get_or_try_insert_with(model_key, || {
            info!(forest_size, "training model");
            self.trainer.train(&training.table, forest_size)
        })?;

        let composite_request = TemporalCompositor::inference(self.config).request(&roi, window)?;
        let composite = cache
            .composites
            .get_or_try_insert_with(composite_request.key(), || {
                composite_request.evaluate(self.backend)
            })?;

        let classified = cache.classified.get_or_try_insert_with(
            (model.key().clone(), composite.key.clone()),
            || model.predict(&composite),
        )?;

        Ok(WorkflowOutput {
            training,
            model,
            composite,
            classified,
        })
    }
}

// ---------------------------------------------------------------------------
// Custom
// ---------------------------------------------------------------------------

/// Train on caller-supplied point sources, then classify a region.
pub struct CustomWorkflow<'a, B: ImageryBackend + ?Sized> {
    session: Session<'a, B>,
}

impl<'a, B: ImageryBackend + ?Sized> CustomWorkflow<'a, B> {
    pub fn new(backend: &'a B, config: &'a PipelineConfig, boundaries: &'a BoundaryCatalog) -> Self {
        Self {
            session: Session::new(backend, config, boundaries),
        }
    }

    /// Build (or reuse) the training set for `sources`, train (or reuse) a
    /// forest of `forest_size` trees, and classify the requested region.
    ///
    /// The training set is rebuilt only when the set of source names
    /// changes; the model only when the table or forest size changes.
    ///
    /// # Errors
    /// Date and region problems are reported before any archive call.
    pub fn run(
        &self,
        cache: &mut PipelineCache,
        sources: &[LabeledSource],
        forest_size: usize,
        request: &InferenceRequest,
    ) -> Result<WorkflowOutput> {
        if sources.is_empty() {
            return Err(PipelineError::input("training set", "no labeled sources given"));
        }
        let key: TrainingKey = sources.iter().map(|s| s.name().to_string()).collect();
        self.session
            .run(cache, key, || Ok((sources.to_vec(), Vec::new())), forest_size, request)
    }
}

// ---------------------------------------------------------------------------
// Pretrained
// ---------------------------------------------------------------------------

/// Forest size of the pretrained model
pub const PRETRAINED_FOREST_SIZE: usize = 50;

/// Train once on the configured ground-truth files, then classify a region.
pub struct PretrainedWorkflow<'a, B: ImageryBackend + ?Sized> {
    session: Session<'a, B>,
}

impl<'a, B: ImageryBackend + ?Sized> PretrainedWorkflow<'a, B> {
    pub fn new(backend: &'a B, config: &'a PipelineConfig, boundaries: &'a BoundaryCatalog) -> Self {
        Self {
            session: Session::new(backend, config, boundaries),
        }
    }

    /// Check and read every configured ground-truth file.
    ///
    /// Files that exist but cannot be parsed are returned as failures next
    /// to the sources that loaded.
    ///
    /// # Errors
    /// A missing data directory or CSV file fails; a polygon group with a
    /// missing file is skipped with a warning.
    pub fn load_sources(&self) -> Result<(Vec<LabeledSource>, Vec<SourceFailure>)> {
        let config = self.session.config;
        let spec = &config.pretrained;
        let check = check_sources(&spec.data_dir, &spec.csv_files, &spec.polygon_groups)?;

        let mut sources = Vec::new();
        let mut failures = Vec::new();
        for name in &spec.csv_files {
            match read_point_csv_file(csv_path(&spec.data_dir, name)) {
                Ok(source) => sources.push(source.into()),
                Err(error) => failures.push(SourceFailure {
                    source_name: name.clone(),
                    error,
                }),
            }
        }
        for (i, group) in spec.polygon_groups.iter().enumerate() {
            if !check.group_usable(i) {
                warn!(group = ?group.files, "polygon group skipped");
                continue;
            }
            match load_polygon_group(&spec.data_dir, group, &config.labels) {
                Ok(source) => sources.push(source.into()),
                Err(error) => failures.push(SourceFailure {
                    source_name: group.files.join(","),
                    error,
                }),
            }
        }
        Ok((sources, failures))
    }

    fn training_key(&self) -> TrainingKey {
        let spec = &self.session.config.pretrained;
        let mut key: TrainingKey = vec![spec.data_dir.display().to_string()];
        key.extend(spec.csv_files.iter().cloned());
        key.extend(spec.polygon_groups.iter().flat_map(|g| g.files.iter().cloned()));
        key
    }

    /// Train (once per cache) with [`PRETRAINED_FOREST_SIZE`] trees and
    /// classify the requested region.
    pub fn run(&self, cache: &mut PipelineCache, request: &InferenceRequest) -> Result<WorkflowOutput> {
        self.session.run(
            cache,
            self.training_key(),
            || self.load_sources(),
            PRETRAINED_FOREST_SIZE,
            request,
        )
    }
}
