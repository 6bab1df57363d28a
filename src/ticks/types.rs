//! Tick record types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Instrument id as used by the exchange feed
pub type InstrumentId = u32;

/// Which tick stream a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Trade prints
    Trades,
    /// Top-of-book quotes
    Tbbo,
}

impl StreamKind {
    /// Directory and filename tag for this stream
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Trades => "trades",
            StreamKind::Tbbo => "tbbo",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single trade print
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTick {
    /// Exchange feed time
    pub ts: DateTime<Utc>,
    pub price: Decimal,
    pub size: u64,
    pub instrument_id: InstrumentId,
}

/// A single top-of-book quote update
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteTick {
    /// Exchange feed time
    pub ts: DateTime<Utc>,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub instrument_id: InstrumentId,
}

impl QuoteTick {
    /// Mid price
    pub fn mid(&self) -> Decimal {
        (self.bid_price + self.ask_price) / Decimal::TWO
    }
}

/// On-disk encoding of a tick container, both zstd-compressed
///
/// Ordered by preference: when one day is present in both encodings the
/// binary container is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TickEncoding {
    /// Databento binary encoding (DBN)
    Dbn,
    /// Databento CSV encoding
    Csv,
}

impl TickEncoding {
    pub const ALL: [TickEncoding; 2] = [TickEncoding::Dbn, TickEncoding::Csv];

    /// Filename extension, after the stream kind
    pub fn extension(&self) -> &'static str {
        match self {
            TickEncoding::Dbn => "dbn.zst",
            TickEncoding::Csv => "csv.zst",
        }
    }
}

/// A tick container file discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TickFile {
    /// Session date embedded in the filename
    pub date: NaiveDate,
    pub kind: StreamKind,
    pub encoding: TickEncoding,
    pub path: PathBuf,
}

impl TickFile {
    /// Filename component of the path
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Per-file row accounting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RowStats {
    /// Rows accepted for the requested instrument
    pub accepted: u64,
    /// Rows for other instruments
    pub filtered: u64,
    /// Rows dropped as malformed
    pub skipped: u64,
}

impl RowStats {
    pub fn total(&self) -> u64 {
        self.accepted + self.filtered + self.skipped
    }

    pub fn merge(&mut self, other: RowStats) {
        self.accepted += other.accepted;
        self.filtered += other.filtered;
        self.skipped += other.skipped;
    }
}

/// Tick decoding errors
#[derive(Debug, Error)]
pub enum TickError {
    /// The whole file is unusable
    #[error("Malformed tick file {path:?}: {reason}")]
    MalformedFile { path: PathBuf, reason: String },
    /// A single row is unusable
    #[error("Malformed tick row {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
}

impl TickError {
    pub fn file(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        TickError::MalformedFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn row(line: u64, reason: impl Into<String>) -> Self {
        TickError::MalformedRow {
            line,
            reason: reason.into(),
        }
    }
}
