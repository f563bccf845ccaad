//! Pipeline configuration

use std::fs;
use std::path::{Path, PathBuf};

use agriplast_core::BandSet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::labels::ClassLabelMap;

/// Band names the classifier samples on, spectral bands first then indices
pub const DEFAULT_BANDS: [&str; 11] = [
    "B4", "B3", "B2", "B6", "B8", "B11", "B12", "NDVI", "NDTI", "PGI", "PMLI",
];

/// Largest accepted forest size
pub const MAX_FOREST_SIZE: usize = 100;

/// Longest window, in days, a config may ask for
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Every tunable of the training and inference pipeline.
///
/// Loaded from TOML; any field left out takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Trees in the random forest (1..=100)
    pub forest_size: usize,
    /// Point sources composite over `date ± half_window_days`
    pub half_window_days: i64,
    /// A single inference date expands to this many days
    pub inference_window_days: i64,
    /// Scenes at or above this cloud percentage are skipped
    pub max_cloud_cover: f64,
    /// Observations on or before this date predate the archive
    pub archive_inception: NaiveDate,
    /// Collection training composites are drawn from
    pub collection: String,
    /// Collection inference composites are drawn from
    pub inference_collection: String,
    /// Labels dropped from point sources before training
    pub excluded_labels: Vec<String>,
    /// Region classified when none is selected
    pub default_county: String,
    /// Seed for the random split column and the forest
    pub split_seed: u64,
    pub bands: BandSet,
    pub labels: ClassLabelMap,
    pub pretrained: PretrainedSources,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            forest_size: 50,
            half_window_days: 15,
            inference_window_days: 14,
            max_cloud_cover: 20.0,
            archive_inception: NaiveDate::from_ymd_opt(2018, 5, 9).unwrap_or_default(),
            collection: "COPERNICUS/S2_SR_HARMONIZED".to_string(),
            inference_collection: "COPERNICUS/S2_SR".to_string(),
            excluded_labels: vec!["green house".to_string()],
            default_county: "Los Angeles".to_string(),
            split_seed: 0,
            bands: default_bands(),
            labels: ClassLabelMap::default(),
            pretrained: PretrainedSources::default(),
        }
    }
}

fn default_bands() -> BandSet {
    BandSet::new(DEFAULT_BANDS).unwrap_or_else(|_| unreachable!("default band names are unique"))
}

impl PipelineConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        validate_forest_size(self.forest_size)?;
        if !(1..=MAX_WINDOW_DAYS).contains(&self.half_window_days) {
            return Err(invalid(
                "half_window_days",
                self.half_window_days,
                "must be between 1 and 366",
            ));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.inference_window_days) {
            return Err(invalid(
                "inference_window_days",
                self.inference_window_days,
                "must be between 1 and 366",
            ));
        }
        if !(self.max_cloud_cover > 0.0 && self.max_cloud_cover <= 100.0) {
            return Err(invalid("max_cloud_cover", self.max_cloud_cover, "must be in (0, 100]"));
        }
        if self.collection.is_empty() || self.inference_collection.is_empty() {
            return Err(invalid("collection", "\"\"", "must not be empty"));
        }
        for group in &self.pretrained.polygon_groups {
            if group.files.len() < 2 {
                return Err(invalid(
                    "polygon_groups",
                    group.files.join(","),
                    "a group needs a boundary file and at least one label file",
                ));
            }
            if group.start >= group.end {
                return Err(PipelineError::InvalidDateWindow {
                    start: group.start,
                    end: group.end,
                });
            }
        }
        Ok(())
    }
}

/// Forest sizes accepted by the trainer
pub fn validate_forest_size(n: usize) -> Result<()> {
    if !(1..=MAX_FOREST_SIZE).contains(&n) {
        return Err(invalid("forest_size", n, "must be between 1 and 100"));
    }
    Ok(())
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Fixed ground-truth files behind the pretrained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PretrainedSources {
    pub data_dir: PathBuf,
    /// CSV point files, without extension
    pub csv_files: Vec<String>,
    pub polygon_groups: Vec<PolygonGroupSpec>,
}

impl Default for PretrainedSources {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            csv_files: ["Mendocino", "SantaMaria", "Watsonville"]
                .into_iter()
                .map(String::from)
                .collect(),
            polygon_groups: vec![PolygonGroupSpec {
                files: ["Oxnard", "label_mulch_hoop", "label_nonplastic"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                start: NaiveDate::from_ymd_opt(2019, 2, 1).unwrap_or_default(),
                end: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap_or_default(),
            }],
        }
    }
}

/// Polygon files sharing one window. The first file is the region of
/// interest; the rest hold labeled polygons. Names carry no extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonGroupSpec {
    pub files: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}
