//! Datasets command implementation

use crate::catalog::{Catalog, JsonCatalog};
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct DatasetsArgs {
    /// Only list datasets of this symbol
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Print records as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl DatasetsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let catalog = JsonCatalog::new(config.data.catalog_path());
        let records: Vec<_> = catalog
            .list_datasets()?
            .into_iter()
            .filter(|r| self.symbol.as_deref().map_or(true, |s| r.symbol == s))
            .collect();

        if records.is_empty() {
            tracing::info!(catalog = ?catalog.path(), "No datasets registered");
            return Ok(());
        }

        for record in &records {
            if self.json {
                println!("{}", serde_json::to_string(record)?);
            } else {
                println!(
                    "{:<20} {} .. {}  {:>12} bytes  {}",
                    record.dataset_id,
                    record.from_date,
                    record.to_date,
                    record.size_bytes,
                    record.bars_path.display()
                );
            }
        }
        Ok(())
    }
}
