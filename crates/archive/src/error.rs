//! Error types for imagery archives.

use thiserror::Error;

/// Errors produced while searching or loading scenes.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("scene '{item}' has no asset for band '{band}'")]
    MissingAsset { item: String, band: String },

    #[error("invalid scene '{id}': {reason}")]
    InvalidItem { id: String, reason: String },

    #[error("scene '{0}' not found in archive")]
    UnknownScene(String),

    #[error("archive unavailable: {0}")]
    Unavailable(String),

    #[error("core error: {0}")]
    Core(#[from] agriplast_core::Error),
}

/// Result alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
