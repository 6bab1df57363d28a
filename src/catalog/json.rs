//! JSON-file catalog

use super::{Catalog, CatalogError, DatasetRecord};
use crate::data::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    datasets: BTreeMap<String, DatasetRecord>,
}

/// Catalog stored as one JSON document, rewritten atomically on each upsert
///
/// The mutex serializes writers within the process; across processes the
/// last rename wins.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CatalogFile, CatalogError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CatalogFile::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl Catalog for JsonCatalog {
    fn upsert_dataset(&self, record: DatasetRecord) -> Result<(), CatalogError> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::Poisoned)?;

        let mut file = self.read()?;
        tracing::debug!(dataset_id = %record.dataset_id, catalog = ?self.path, "Upserting dataset");
        file.datasets.insert(record.dataset_id.clone(), record);

        write_atomic(&self.path, |out| {
            serde_json::to_writer_pretty(&mut *out, &file)?;
            out.write_all(b"\n")?;
            Ok(())
        })?;
        Ok(())
    }

    fn get_dataset(&self, dataset_id: &str) -> Result<Option<DatasetRecord>, CatalogError> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::Poisoned)?;
        Ok(self.read()?.datasets.remove(dataset_id))
    }

    fn list_datasets(&self) -> Result<Vec<DatasetRecord>, CatalogError> {
        let _guard = self.lock.lock().map_err(|_| CatalogError::Poisoned)?;
        Ok(self.read()?.datasets.into_values().collect())
    }
}
