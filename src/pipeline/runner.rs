//! Batch derivation over every (symbol, year) pair
//!
//! Each job runs the synchronous [`Deriver`] on a blocking worker. At most
//! `max_concurrent` jobs are in flight; successful jobs are registered in the
//! catalog.

use super::{default_rth_only, DataLayout, DeriveError, DeriveRequest, Deriver};
use crate::bars::Timeframe;
use crate::catalog::{Catalog, CatalogError, DatasetRecord, DatasetStatus};
use crate::data::OutputFormat;
use crate::manifest::DerivationManifest;
use crate::ticks::{discover_years, StreamKind, Symbology};
use chrono::{Datelike, NaiveDate};
use std::fs;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Failure of one batch job
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error("Catalog upsert failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Failed to stat bar file: {0}")]
    Io(#[from] io::Error),

    #[error("Derivation task panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::Derive(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// What `derive-all` should build
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Explicit symbols; `None` derives every symbol of the symbology table
    pub symbols: Option<Vec<String>>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub timeframe: Timeframe,
    pub output_format: OutputFormat,
    pub fill_gaps: bool,
    /// Defaults to regular hours only for daily bars
    pub rth_only: Option<bool>,
    pub force: bool,
}

impl BatchRequest {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            symbols: None,
            from_date: None,
            to_date: None,
            timeframe,
            output_format: OutputFormat::Parquet,
            fill_gaps: false,
            rth_only: None,
            force: false,
        }
    }

    pub fn rth_only(&self) -> bool {
        self.rth_only
            .unwrap_or_else(|| default_rth_only(self.timeframe))
    }

    fn job(&self, symbol: &str, year: i32) -> DeriveRequest {
        DeriveRequest::new(symbol, year)
            .with_window(self.from_date, self.to_date)
            .with_timeframe(self.timeframe)
            .with_output_format(self.output_format)
            .with_fill_gaps(self.fill_gaps)
            .with_rth_only(self.rth_only())
            .with_force(self.force)
    }
}

/// A failed (symbol, year) job
#[derive(Debug)]
pub struct JobFailure {
    pub symbol: String,
    pub year: i32,
    pub error: JobError,
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<DatasetRecord>,
    pub failed: Vec<JobFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Zero when every job succeeded, otherwise the code of the first failure
    pub fn exit_code(&self) -> i32 {
        self.failed.first().map_or(0, |f| f.error.exit_code())
    }
}

/// Build the catalog record for a finished derivation
pub fn dataset_record(
    layout: &DataLayout,
    manifest: &DerivationManifest,
) -> io::Result<DatasetRecord> {
    let year = manifest.from_date.year();
    let bars_path = layout.bars_path(
        &manifest.symbol,
        year,
        manifest.interval,
        manifest.params.output_format,
    );
    let size_bytes = fs::metadata(&bars_path)?.len();

    Ok(DatasetRecord {
        dataset_id: manifest.dataset_id.clone(),
        symbol: manifest.symbol.clone(),
        from_date: manifest.from_date,
        to_date: manifest.to_date,
        products: vec!["TRADES".to_string(), "TBBO".to_string()],
        calendar_version: manifest.calendar_version.clone(),
        tz: manifest.tz.clone(),
        manifest_path: layout.manifest_path(&manifest.symbol, year, manifest.interval),
        bars_path,
        generated_at: manifest.created_at,
        size_bytes,
        status: DatasetStatus::Ready,
    })
}

fn run_job(
    deriver: &Deriver,
    catalog: &dyn Catalog,
    request: &DeriveRequest,
) -> Result<DatasetRecord, JobError> {
    let manifest = deriver.derive(request)?;
    let record = dataset_record(deriver.layout(), &manifest)?;
    catalog.upsert_dataset(record.clone())?;
    tracing::info!(dataset_id = %record.dataset_id, "Registered dataset");
    Ok(record)
}

/// Runs derivations for many (symbol, year) pairs
pub struct BatchRunner {
    deriver: Arc<Deriver>,
    catalog: Arc<dyn Catalog>,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(deriver: Deriver, catalog: Arc<dyn Catalog>, max_concurrent: usize) -> Self {
        Self {
            deriver: Arc::new(deriver),
            catalog,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Expand a batch request into (symbol, year) jobs
    pub fn plan(&self, request: &BatchRequest) -> anyhow::Result<Vec<(String, i32)>> {
        let layout = self.deriver.layout();

        let symbols = match &request.symbols {
            Some(symbols) => symbols.clone(),
            None => {
                let path = layout.symbology_path().ok_or_else(|| {
                    anyhow::anyhow!(
                        "No symbology.json under {:?}",
                        layout.base_dir().join("raw").join("databento")
                    )
                })?;
                Symbology::load(&path)?.symbols()
            }
        };
        if symbols.is_empty() {
            anyhow::bail!("No symbols to derive");
        }

        let from_year = request.from_date.map(|d| d.year());
        let to_year = request.to_date.map(|d| d.year());
        let trades_dir = layout.stream_dir(StreamKind::Trades);
        let years: Vec<i32> = discover_years(&trades_dir, StreamKind::Trades)?
            .into_iter()
            .filter(|y| from_year.map_or(true, |from| *y >= from))
            .filter(|y| to_year.map_or(true, |to| *y <= to))
            .collect();
        if years.is_empty() {
            anyhow::bail!("No trade files found for the requested years");
        }

        Ok(symbols
            .iter()
            .flat_map(|symbol| years.iter().map(move |year| (symbol.clone(), *year)))
            .collect())
    }

    /// Run every planned job; individual failures are collected, not raised
    pub async fn run(&self, request: &BatchRequest) -> anyhow::Result<BatchReport> {
        let jobs = self.plan(request)?;
        tracing::info!(
            jobs = jobs.len(),
            timeframe = %request.timeframe,
            format = %request.output_format,
            fill_gaps = request.fill_gaps,
            rth_only = request.rth_only(),
            force = request.force,
            max_concurrent = self.max_concurrent,
            "Starting batch derivation"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, (symbol, year)) in jobs.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let deriver = Arc::clone(&self.deriver);
            let catalog = Arc::clone(&self.catalog);
            let job = request.job(&symbol, year);

            tasks.spawn(async move {
                let joined = tokio::task::spawn_blocking(move || {
                    run_job(&deriver, catalog.as_ref(), &job)
                })
                .await;
                drop(permit);
                let result = joined.unwrap_or_else(|e| Err(JobError::Panicked(e.to_string())));
                (index, symbol, year, result)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined?);
        }
        outcomes.sort_by_key(|(index, ..)| *index);

        let mut report = BatchReport::default();
        for (_, symbol, year, result) in outcomes {
            match result {
                Ok(record) => report.succeeded.push(record),
                Err(error) => {
                    tracing::error!(%symbol, year, %error, "Derivation job failed");
                    report.failed.push(JobFailure {
                        symbol,
                        year,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch derivation finished"
        );
        Ok(report)
    }
}
