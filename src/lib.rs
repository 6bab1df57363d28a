//! hewston-bars: canonical OHLCV bars from exchange tick data
//!
//! This library provides the core components for:
//! - Tick container discovery and decoding (trades and top-of-book quotes)
//! - Per-minute aggregation and trade/quote reconciliation
//! - Carry-forward gap filling and exchange session labeling
//! - Resampling to 5Min, 15Min, 1Hour and 1Day bars
//! - Bar files in parquet, CSV or JSON lines with idempotency manifests
//! - Batch derivation with a dataset catalog
//! - Structured logging and Prometheus metrics

pub mod bars;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod manifest;
pub mod pipeline;
pub mod telemetry;
pub mod ticks;
