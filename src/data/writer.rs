//! Bar file output: format dispatch and atomic replace

use super::parquet::{read_parquet, write_parquet};
use crate::bars::CanonicalBar;
use crate::pipeline::DeriveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors while producing a bar or manifest file
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bar file encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Parquet,
    Csv,
    Jsonl,
}

impl OutputFormat {
    /// File extension, also the serialized name
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = DeriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "csv" => Ok(OutputFormat::Csv),
            "jsonl" => Ok(OutputFormat::Jsonl),
            _ => Err(DeriveError::UnsupportedOutputFormat(s.to_string())),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a file by filling `<path>.tmp` and renaming it over `path`
///
/// Readers never observe a partially written file. The temp file is removed
/// if `fill` fails.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<u64, WriteError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), WriteError>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);

    let result = (|| {
        let mut out = BufWriter::new(File::create(&tmp)?);
        fill(&mut out)?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok::<_, WriteError>(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    let size = fs::metadata(path)?.len();
    tracing::debug!(path = ?path, size, "Atomically replaced file");
    Ok(size)
}

/// Write `bars` to `path` in `format`, returning the file size in bytes
pub fn write_bars(path: &Path, format: OutputFormat, bars: &[CanonicalBar]) -> Result<u64, WriteError> {
    write_atomic(path, |out| match format {
        OutputFormat::Parquet => write_parquet(out, bars),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for bar in bars {
                writer.serialize(bar)?;
            }
            writer.flush()?;
            Ok(())
        }
        OutputFormat::Jsonl => {
            for bar in bars {
                serde_json::to_writer(&mut *out, bar)?;
                out.write_all(b"\n")?;
            }
            Ok(())
        }
    })
}

/// Read a bar file written by [`write_bars`]
pub fn read_bars(path: &Path, format: OutputFormat) -> anyhow::Result<Vec<CanonicalBar>> {
    match format {
        OutputFormat::Parquet => read_parquet(path),
        OutputFormat::Csv => {
            let mut reader = csv::Reader::from_path(path)?;
            let mut bars = Vec::new();
            for record in reader.deserialize() {
                bars.push(record?);
            }
            Ok(bars)
        }
        OutputFormat::Jsonl => {
            let reader = BufReader::new(File::open(path)?);
            let mut bars = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                bars.push(serde_json::from_str(&line)?);
            }
            Ok(bars)
        }
    }
}
