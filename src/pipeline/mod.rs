//! Derivation pipeline
//!
//! Ties the stages together: tick discovery, minute aggregation,
//! reconciliation, gap filling, session labeling and resampling, followed by
//! the bar file and manifest writes. [`BatchRunner`] fans the same pipeline
//! out over many (symbol, year) pairs.

mod deriver;
mod error;
mod layout;
mod progress;
mod runner;

pub use deriver::{default_rth_only, DeriveRequest, Deriver};
pub use error::DeriveError;
pub use layout::{DataLayout, SYMBOLOGY_FILE};
pub use progress::{estimate_remaining, Progress};
pub use runner::{dataset_record, BatchReport, BatchRequest, BatchRunner, JobError, JobFailure};
