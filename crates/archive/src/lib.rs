//! # Agriplast Archive
//!
//! Searchable archives of multispectral scenes behind one contract.
//!
//! - [`ImageryBackend`]: search scenes by collection, footprint and dates,
//!   load their bands, composite and sample them
//! - [`LocalArchive`]: a directory holding `catalog.json` plus per-band GeoTIFFs
//! - [`MemoryArchive`]: scenes held in memory

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod models;

pub use backend::ImageryBackend;
pub use error::{ArchiveError, Result};
pub use local::LocalArchive;
pub use memory::MemoryArchive;
pub use models::{SceneAsset, SceneCatalog, SceneItem, SceneQuery};
