//! Derive command implementation

use crate::bars::Timeframe;
use crate::config::Config;
use crate::data::OutputFormat;
use crate::pipeline::{default_rth_only, DeriveRequest, Deriver};
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Ticker symbol as listed in symbology.json
    #[arg(short, long)]
    pub symbol: String,

    /// Calendar year to derive
    #[arg(short, long)]
    pub year: i32,

    /// First session date (YYYY-MM-DD), clipped to the year
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last session date (YYYY-MM-DD), clipped to the year
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

    /// Re-derive even if an up-to-date manifest exists
    #[arg(long)]
    pub force: bool,
}

impl DeriveArgs {
    /// Build the request; fails on unsupported timeframe or format before any I/O
    pub fn request(&self) -> anyhow::Result<DeriveRequest> {
        let timeframe: Timeframe = self.timeframe.parse()?;
        let format: OutputFormat = self.format.parse()?;
        Ok(DeriveRequest::new(&self.symbol, self.year)
            .with_window(self.from, self.to)
            .with_timeframe(timeframe)
            .with_output_format(format)
            .with_fill_gaps(self.fill_gaps)
            .with_rth_only(
                self.rth_only
                    .unwrap_or_else(|| default_rth_only(timeframe)),
            )
            .with_force(self.force))
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let request = self.request()?;
        let deriver = Deriver::new(config)?;

        let manifest = tokio::task::spawn_blocking(move || deriver.derive(&request)).await??;

        println!("{}", serde_json::to_string_pretty(&manifest)?);
        Ok(())
    }
}
