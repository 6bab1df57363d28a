//! On-disk data layout
//!
//! ```text
//! <base>/raw/databento/trades/<dataset>-YYYYMMDD.trades.<dbn|csv>.zst
//! <base>/raw/databento/trades/symbology.json
//! <base>/raw/databento/tbbo/<dataset>-YYYYMMDD.tbbo.<dbn|csv>.zst
//! <base>/derived/bars/<SYMBOL>/<YEAR>/bars_<tf>.<ext>
//! <base>/derived/bars/<SYMBOL>/<YEAR>/bars_<tf>_manifest.json
//! ```

use crate::bars::Timeframe;
use crate::data::OutputFormat;
use crate::ticks::StreamKind;
use std::path::{Path, PathBuf};

pub const SYMBOLOGY_FILE: &str = "symbology.json";

/// Resolves every path the pipeline reads or writes
#[derive(Debug, Clone)]
pub struct DataLayout {
    base_dir: PathBuf,
}

impl DataLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the tick containers of one stream
    pub fn stream_dir(&self, kind: StreamKind) -> PathBuf {
        self.base_dir
            .join("raw")
            .join("databento")
            .join(kind.as_str())
    }

    /// Symbology side-car: trades directory first, then tbbo
    pub fn symbology_path(&self) -> Option<PathBuf> {
        [StreamKind::Trades, StreamKind::Tbbo]
            .into_iter()
            .map(|kind| self.stream_dir(kind).join(SYMBOLOGY_FILE))
            .find(|path| path.is_file())
    }

    pub fn bars_dir(&self, symbol: &str, year: i32) -> PathBuf {
        self.base_dir
            .join("derived")
            .join("bars")
            .join(symbol)
            .join(year.to_string())
    }

    pub fn bars_file_name(timeframe: Timeframe, format: OutputFormat) -> String {
        format!("bars_{}.{}", timeframe.label(), format.extension())
    }

    pub fn bars_path(
        &self,
        symbol: &str,
        year: i32,
        timeframe: Timeframe,
        format: OutputFormat,
    ) -> PathBuf {
        self.bars_dir(symbol, year)
            .join(Self::bars_file_name(timeframe, format))
    }

    pub fn manifest_path(&self, symbol: &str, year: i32, timeframe: Timeframe) -> PathBuf {
        self.bars_dir(symbol, year)
            .join(format!("bars_{}_manifest.json", timeframe.label()))
    }

    /// Catalog key for a (symbol, year, timeframe) dataset
    pub fn dataset_id(symbol: &str, year: i32, timeframe: Timeframe) -> String {
        format!("{}-{}-{}", symbol, year, timeframe.short())
    }
}
