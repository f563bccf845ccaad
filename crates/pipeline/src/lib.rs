//! # Agriplast Pipeline
//!
//! Turns labeled ground truth and a scene archive into a feature table,
//! trains a random forest on it and classifies a region.
//!
//! - [`TemporalCompositor`]: cloud-masked, index-augmented median composites
//! - [`TrainingSetBuilder`]: per-source compositing and sampling, unioned
//!   into one [`FeatureTable`]
//! - [`RandomForestTrainer`] / [`TrainedModel`]: training, prediction and
//!   the resubstitution confusion matrix
//! - [`PipelineCache`]: single-slot memoization keyed by the inputs of
//!   each artifact
//! - [`CustomWorkflow`] / [`PretrainedWorkflow`]: the two end-to-end flows
//!
//! ```no_run
//! use agriplast_archive::LocalArchive;
//! use agriplast_pipeline::prelude::*;
//!
//! let archive = LocalArchive::open("archive")?;
//! let config = PipelineConfig::default();
//! let boundaries = BoundaryCatalog::from_geojson_file("counties.geojson", Some("06"))?;
//! let sources = vec![read_point_csv_file("fields.csv")?.into()];
//!
//! let mut cache = PipelineCache::new();
//! let start = chrono::NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
//! let request = InferenceRequest::new(None, vec![start]);
//! let out = CustomWorkflow::new(&archive, &config, &boundaries)
//!     .run(&mut cache, &sources, 50, &request)?;
//! println!("accuracy {:.3}", out.model.accuracy());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod classifier;
pub mod compositor;
pub mod config;
pub mod error;
pub mod feature_table;
pub mod ground_truth;
pub mod input;
pub mod labels;
pub mod roi;
pub mod training;
pub mod window;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{PipelineCache, Slot};
pub use classifier::{
    ClassifiedRaster, ClassifierTrainer, ModelKey, RandomForestTrainer, TrainedModel,
};
pub use compositor::{CompositeImage, CompositeKey, CompositeRequest, TemporalCompositor};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result, SourceFailure};
pub use feature_table::{FeatureRow, FeatureTable, TableId};
pub use ground_truth::{LabeledPoint, LabeledRegion, LabeledSource, PointSource, PolygonSource};
pub use labels::{ClassLabelMap, ClassStyle};
pub use roi::{BoundaryCatalog, RegionOfInterest};
pub use training::{SourceReport, TrainingSet, TrainingSetBuilder};
pub use window::DateWindow;
pub use workflow::{CustomWorkflow, InferenceRequest, PretrainedWorkflow, WorkflowOutput};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cache::PipelineCache;
    pub use crate::classifier::{ClassifierTrainer, RandomForestTrainer, TrainedModel};
    pub use crate::compositor::TemporalCompositor;
    pub use crate::config::PipelineConfig;
    pub use crate::error::{PipelineError, Result};
    pub use crate::ground_truth::{LabeledPoint, LabeledSource};
    pub use crate::input::{read_point_csv_file, read_region_geojson_file};
    pub use crate::labels::ClassLabelMap;
    pub use crate::roi::{BoundaryCatalog, RegionOfInterest};
    pub use crate::training::TrainingSetBuilder;
    pub use crate::window::DateWindow;
    pub use crate::workflow::{CustomWorkflow, InferenceRequest, PretrainedWorkflow};
}
