//! Derivation manifest record and its persistence

use crate::bars::Timeframe;
use crate::data::{write_atomic, OutputFormat, WriteError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("I/O error reading manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unparsable manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write manifest: {0}")]
    Write(#[from] WriteError),
}

/// Options that change the bar content of a derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveParams {
    pub output_format: OutputFormat,
    pub fill_gaps: bool,
    pub rth_only: bool,
}

/// Record of one derivation: what went in, what came out
///
/// Maps are ordered so the serialized form is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationManifest {
    pub dataset_id: String,
    pub symbol: String,
    pub interval: Timeframe,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub params: DeriveParams,
    pub input_hashes: BTreeMap<String, String>,
    pub output_hashes: BTreeMap<String, String>,
    pub calendar_version: String,
    pub tz: String,
    pub created_at: DateTime<Utc>,
}

impl DerivationManifest {
    /// Load a manifest; `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Atomically write the manifest as pretty JSON
    pub fn store(&self, path: &Path) -> Result<(), ManifestError> {
        write_atomic(path, |out| {
            serde_json::to_writer_pretty(&mut *out, self)?;
            out.write_all(b"\n")?;
            Ok(())
        })?;
        Ok(())
    }

    /// Whether this manifest describes the same derivation request
    pub fn describes(
        &self,
        symbol: &str,
        interval: Timeframe,
        from_date: NaiveDate,
        to_date: NaiveDate,
        params: &DeriveParams,
    ) -> bool {
        self.symbol == symbol
            && self.interval == interval
            && self.from_date == from_date
            && self.to_date == to_date
            && &self.params == params
    }
}
