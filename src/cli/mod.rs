//! CLI interface for hewston-bars
//!
//! Provides subcommands for:
//! - `derive`: Derive one (symbol, year, timeframe) bar file
//! - `derive-all`: Derive every symbol and year found on disk
//! - `datasets`: List catalog entries
//! - `config`: Show the effective configuration

mod datasets;
mod derive;
mod derive_all;

pub use datasets::DatasetsArgs;
pub use derive::DeriveArgs;
pub use derive_all::DeriveAllArgs;

use crate::pipeline::{DeriveError, JobError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hewston-bars")]
#[command(about = "Derive canonical OHLCV bars from exchange tick data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    /// Data root directory (overrides data.base_dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive bars for one symbol and year
    Derive(DeriveArgs),
    /// Derive bars for every symbol and year
    DeriveAll(DeriveAllArgs),
    /// List derived datasets
    Datasets(DatasetsArgs),
    /// Show configuration
    Config,
}

/// Process exit code for an error returned by a command
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<DeriveError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<JobError>() {
        return e.exit_code();
    }
    1
}
