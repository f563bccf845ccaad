//! Pipeline error taxonomy.

use agriplast_archive::ArchiveError;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors produced by the training and classification pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed or missing labeled source
    #[error("input data error in '{source_name}': {reason}")]
    InputData { source_name: String, reason: String },

    /// No qualifying imagery for the region and window
    #[error("no qualifying imagery in {collection} for {window} over {roi}")]
    EmptyComposite {
        collection: String,
        roi: String,
        window: String,
    },

    /// Imagery archive failure, surfaced verbatim
    #[error("backend error: {0}")]
    Backend(#[from] ArchiveError),

    /// A ground-truth label that the class map does not know
    #[error("label '{label}' in '{source_name}' is not in the class map")]
    LabelMapping { source_name: String, label: String },

    #[error("invalid date window {start}..{end}: start must precede end")]
    InvalidDateWindow { start: NaiveDate, end: NaiveDate },

    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("core error: {0}")]
    Core(#[from] agriplast_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn input(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputData {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A labeled source whose contribution was dropped, and why.
#[derive(Debug)]
pub struct SourceFailure {
    pub source_name: String,
    pub error: PipelineError,
}
