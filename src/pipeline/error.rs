//! Derivation error taxonomy

use crate::data::WriteError;
use crate::manifest::ManifestError;
use chrono::NaiveDate;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal derivation errors
///
/// File- and row-level tick problems never surface here; they are absorbed
/// and counted by the aggregation stage.
#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("No instrument id resolvable for symbol {symbol}")]
    SymbologyMissing { symbol: String },

    #[error("No usable trade files for {symbol} in {from}..={to}")]
    NoInputData {
        symbol: String,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("Unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedOutputFormat(String),

    #[error("Invalid window {from}..={to} for year {year}")]
    InvalidWindow {
        year: i32,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("Derivation for {symbol} produced no bars")]
    EmptySeries { symbol: String },

    #[error("Failed to write manifest: {0}")]
    ManifestWriteFailure(#[source] ManifestError),

    #[error("Failed to write bar file {path:?}: {source}")]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeriveError {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            DeriveError::UnsupportedTimeframe(_)
            | DeriveError::UnsupportedOutputFormat(_)
            | DeriveError::InvalidWindow { .. } => 2,
            DeriveError::SymbologyMissing { .. } => 3,
            DeriveError::NoInputData { .. } => 4,
            DeriveError::EmptySeries { .. } => 5,
            DeriveError::ManifestWriteFailure(_) | DeriveError::OutputWriteFailure { .. } => 6,
            DeriveError::Io(_) => 1,
        }
    }

    /// Short stable name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            DeriveError::SymbologyMissing { .. } => "symbology_missing",
            DeriveError::NoInputData { .. } => "no_input_data",
            DeriveError::UnsupportedTimeframe(_) => "unsupported_timeframe",
            DeriveError::UnsupportedOutputFormat(_) => "unsupported_output_format",
            DeriveError::InvalidWindow { .. } => "invalid_window",
            DeriveError::EmptySeries { .. } => "empty_series",
            DeriveError::ManifestWriteFailure(_) => "manifest_write_failure",
            DeriveError::OutputWriteFailure { .. } => "output_write_failure",
            DeriveError::Io(_) => "io",
        }
    }
}
