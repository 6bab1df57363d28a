//! Derive-all command implementation

use crate::bars::Timeframe;
use crate::catalog::JsonCatalog;
use crate::config::Config;
use crate::data::OutputFormat;
use crate::pipeline::{BatchRequest, BatchRunner, Deriver};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct DeriveAllArgs {
    /// Symbols to derive (comma separated); defaults to every symbol in symbology.json
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// First session date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last session date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Bar timeframe: 1Min, 5Min, 15Min, 1Hour or 1Day
    #[arg(short, long, default_value = "1Min")]
    pub timeframe: String,

    /// Output format: parquet, csv or jsonl
    #[arg(long, default_value = "parquet")]
    pub format: String,

    /// Carry the last close forward into empty minutes
    #[arg(long)]
    pub fill_gaps: bool,

    /// Keep regular-session bars only [default: true for 1Day, else false]
    #[arg(long)]
    pub rth_only: Option<bool>,

    /// Re-derive even if up-to-date manifests exist
    #[arg(long)]
    pub force: bool,

    /// Maximum concurrent jobs [default: derive.max_concurrent_jobs]
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl DeriveAllArgs {
    pub fn request(&self) -> anyhow::Result<BatchRequest> {
        let timeframe: Timeframe = self.timeframe.parse()?;
        let mut request = BatchRequest::new(timeframe);
        request.symbols = (!self.symbols.is_empty()).then(|| self.symbols.clone());
        request.from_date = self.from;
        request.to_date = self.to;
        request.output_format = self.format.parse::<OutputFormat>()?;
        request.fill_gaps = self.fill_gaps;
        request.rth_only = self.rth_only;
        request.force = self.force;
        Ok(request)
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let request = self.request()?;
        let deriver = Deriver::new(config)?;
        let catalog = Arc::new(JsonCatalog::new(config.data.catalog_path()));
        let jobs = self.jobs.unwrap_or(config.derive.max_concurrent_jobs);

        let runner = BatchRunner::new(deriver, catalog, jobs);
        let report = runner.run(&request).await?;

        for record in &report.succeeded {
            println!(
                "{:<20} {:>12} bytes  {}",
                record.dataset_id,
                record.size_bytes,
                record.bars_path.display()
            );
        }
        for failure in &report.failed {
            eprintln!("FAILED {} {}: {}", failure.symbol, failure.year, failure.error);
        }

        let total = report.succeeded.len() + report.failed.len();
        let failed = report.failed.len();
        match report.failed.into_iter().next() {
            None => Ok(()),
            Some(first) => {
                Err(first.error).with_context(|| format!("{failed} of {total} jobs failed"))
            }
        }
    }
}
