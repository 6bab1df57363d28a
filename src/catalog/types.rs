//! Catalog record types

use crate::data::WriteError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unparsable catalog {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write catalog: {0}")]
    Write(#[from] WriteError),

    #[error("Catalog lock poisoned")]
    Poisoned,
}

/// Availability of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetStatus {
    Ready,
}

/// One derived (symbol, year, timeframe) dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub dataset_id: String,
    pub symbol: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    /// Source products, e.g. `TRADES`, `TBBO`
    pub products: Vec<String>,
    pub calendar_version: String,
    pub tz: String,
    pub bars_path: PathBuf,
    pub manifest_path: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub status: DatasetStatus,
}

/// Dataset registry consumed by the query layer
///
/// Upserts are keyed by `dataset_id`; the last writer wins.
pub trait Catalog: Send + Sync {
    fn upsert_dataset(&self, record: DatasetRecord) -> Result<(), CatalogError>;

    fn get_dataset(&self, dataset_id: &str) -> Result<Option<DatasetRecord>, CatalogError>;

    /// All datasets ordered by id
    fn list_datasets(&self) -> Result<Vec<DatasetRecord>, CatalogError>;
}
