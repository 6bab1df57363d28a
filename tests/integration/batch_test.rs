//! Batch derivation across symbols and years with catalog registration

use crate::common::{date, Fixture, AAPL_ID, MSFT_ID};
use hewston_bars::bars::Timeframe;
use hewston_bars::catalog::{Catalog, DatasetStatus, JsonCatalog};
use hewston_bars::pipeline::{BatchRequest, BatchRunner, DeriveError, Deriver, JobError};
use std::sync::Arc;

fn runner(fixture: &Fixture, catalog: Arc<JsonCatalog>) -> BatchRunner {
    let deriver = Deriver::new(&fixture.config()).unwrap();
    BatchRunner::new(deriver, catalog, 2)
}

#[tokio::test]
async fn test_batch_registers_datasets() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
            ("2024-01-02T15:01:00Z", MSFT_ID, "370", 4),
        ],
    );
    let catalog = Arc::new(JsonCatalog::new(fixture.base().join("catalog/datasets.json")));

    let report = runner(&fixture, Arc::clone(&catalog))
        .run(&BatchRequest::new(Timeframe::OneMinute))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
    let ids: Vec<_> = report.succeeded.iter().map(|r| r.dataset_id.as_str()).collect();
    assert_eq!(ids, vec!["AAPL-2024-1m", "MSFT-2024-1m"]);

    let listed = catalog.list_datasets().unwrap();
    assert_eq!(listed.len(), 2);

    let aapl = catalog.get_dataset("AAPL-2024-1m").unwrap().unwrap();
    assert_eq!(aapl.symbol, "AAPL");
    assert_eq!(aapl.from_date, date("2024-01-01"));
    assert_eq!(aapl.to_date, date("2024-12-31"));
    assert_eq!(aapl.products, vec!["TRADES", "TBBO"]);
    assert_eq!(aapl.status, DatasetStatus::Ready);
    assert_eq!(aapl.tz, "America/New_York");
    assert!(aapl.bars_path.is_file());
    assert!(aapl.manifest_path.is_file());
    assert!(aapl.size_bytes > 0);
}

#[tokio::test]
async fn test_batch_collects_failures() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 10)]);
    let catalog = Arc::new(JsonCatalog::new(fixture.base().join("catalog/datasets.json")));

    let mut request = BatchRequest::new(Timeframe::OneMinute);
    request.symbols = Some(vec!["MSFT".to_string(), "AAPL".to_string(), "TSLA".to_string()]);
    let report = runner(&fixture, Arc::clone(&catalog))
        .run(&request)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].symbol, "AAPL");

    // Failures keep request order.
    let failed: Vec<_> = report.failed.iter().map(|f| f.symbol.as_str()).collect();
    assert_eq!(failed, vec!["MSFT", "TSLA"]);
    assert!(matches!(
        report.failed[0].error,
        JobError::Derive(DeriveError::EmptySeries { .. })
    ));
    assert!(matches!(
        report.failed[1].error,
        JobError::Derive(DeriveError::SymbologyMissing { .. })
    ));
    assert_eq!(report.exit_code(), 5);

    assert_eq!(catalog.list_datasets().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_daily_defaults_to_regular_hours() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T13:00:00Z", AAPL_ID, "90", 100),
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
        ],
    );
    let catalog = Arc::new(JsonCatalog::new(fixture.base().join("catalog/datasets.json")));

    let mut request = BatchRequest::new(Timeframe::OneDay);
    request.symbols = Some(vec!["AAPL".to_string()]);
    let report = runner(&fixture, catalog).run(&request).await.unwrap();
    assert!(report.is_success());

    let record = &report.succeeded[0];
    assert_eq!(record.dataset_id, "AAPL-2024-1d");
    let bars = hewston_bars::data::read_bars(
        &record.bars_path,
        hewston_bars::data::OutputFormat::Parquet,
    )
    .unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].volume, 10);
    assert_eq!(bars[0].open, rust_decimal_macros::dec!(100));
}

#[test]
fn test_plan_expands_symbols_and_years() {
    let fixture = Fixture::new();
    fixture.write_trades("20230103", &[("2023-01-03T15:00:00Z", AAPL_ID, "100", 1)]);
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);
    let catalog = Arc::new(JsonCatalog::new(fixture.base().join("catalog/datasets.json")));
    let runner = runner(&fixture, catalog);

    let jobs = runner.plan(&BatchRequest::new(Timeframe::OneMinute)).unwrap();
    assert_eq!(
        jobs,
        vec![
            ("AAPL".to_string(), 2023),
            ("AAPL".to_string(), 2024),
            ("MSFT".to_string(), 2023),
            ("MSFT".to_string(), 2024),
        ]
    );

    let mut request = BatchRequest::new(Timeframe::OneMinute);
    request.from_date = Some(date("2024-01-01"));
    request.symbols = Some(vec!["AAPL".to_string()]);
    assert_eq!(runner.plan(&request).unwrap(), vec![("AAPL".to_string(), 2024)]);
}

#[test]
fn test_plan_without_symbology_fails() {
    let fixture = Fixture::empty();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);
    let catalog = Arc::new(JsonCatalog::new(fixture.base().join("catalog/datasets.json")));

    assert!(runner(&fixture, catalog)
        .plan(&BatchRequest::new(Timeframe::OneMinute))
        .is_err());
}
