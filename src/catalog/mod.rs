//! Dataset catalog
//!
//! Successful derivations are registered here so the query layer can find
//! bar files without scanning the data directory.

mod json;
mod types;

pub use json::JsonCatalog;
pub use types::{Catalog, CatalogError, DatasetRecord, DatasetStatus};
