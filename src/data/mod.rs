//! Bar file storage
//!
//! Writes canonical bars as parquet, CSV or JSON lines. Every write goes to a
//! temp file in the target directory and is renamed into place.

mod parquet;
mod writer;

pub use self::parquet::{bar_schema, read_parquet, write_parquet};
pub use writer::{read_bars, write_atomic, write_bars, OutputFormat, WriteError};
