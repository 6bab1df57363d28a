//! Tick reader
//!
//! Resolves a symbol through the symbology side-car, discovers tick containers
//! for a date window, and decodes them into typed trade and quote records.

mod binary;
mod files;
mod reader;
mod symbology;
mod types;

pub use files::{discover_tick_files, discover_years, list_tick_files, parse_tick_filename};
pub use reader::{parse_ts, TickReader, TickReaderOptions};
pub use symbology::{SymbolMapping, Symbology};
pub use types::{InstrumentId, QuoteTick, RowStats, StreamKind, TickEncoding, TickError, TickFile, TradeTick};
