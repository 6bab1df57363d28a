//! Single-dataset derivation from tick containers to bar files

use crate::common::{date, day_request, ts, Fixture, AAPL_ID, MSFT_ID};
use hewston_bars::bars::{CanonicalBar, Provider, Session, Timeframe};
use hewston_bars::data::{read_bars, OutputFormat};
use hewston_bars::manifest::DerivationManifest;
use hewston_bars::pipeline::{DataLayout, DeriveError, DeriveRequest, Deriver};
use rust_decimal_macros::dec;
use std::fs;

fn derive_bars(fixture: &Fixture, request: &DeriveRequest) -> Vec<CanonicalBar> {
    let deriver = Deriver::new(&fixture.config()).unwrap();
    deriver.derive(request).unwrap();
    let path = deriver.layout().bars_path(
        &request.symbol,
        request.year,
        request.timeframe,
        request.output_format,
    );
    read_bars(&path, request.output_format).unwrap()
}

#[test]
fn test_trades_build_one_minute_bar() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
            ("2024-01-02T15:00:30Z", AAPL_ID, "102", 5),
            ("2024-01-02T15:00:45Z", MSFT_ID, "370", 100),
        ],
    );

    let bars = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(bars.len(), 1);

    let bar = &bars[0];
    assert_eq!(bar.symbol, "AAPL");
    assert_eq!(bar.t, ts("2024-01-02T15:00:00Z"));
    assert_eq!(bar.open, dec!(100));
    assert_eq!(bar.high, dec!(102));
    assert_eq!(bar.low, dec!(100));
    assert_eq!(bar.close, dec!(102));
    assert_eq!(bar.volume, 15);
    assert_eq!(bar.trade_count, 2);
    let vwap = bar.vwap.unwrap();
    assert!((vwap - dec!(100.6667)).abs() < dec!(0.0001));
    assert_eq!(bar.provider, Provider::Trades);
    assert_eq!(bar.session, Session::Regular);
    assert!(bar.is_rth);
    assert_eq!(bar.timeframe, Timeframe::OneMinute);
    assert_eq!(bar.bar_id, "AAPL-2024-01-02T15:00:00Z-1Min");
}

#[test]
fn test_quote_fills_minute_without_trades() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:10Z", AAPL_ID, "101", 3)]);
    fixture.write_quotes(
        "20240102",
        &[
            ("2024-01-02T15:00:05Z", AAPL_ID, "100.90", "101.10"),
            ("2024-01-02T15:01:10Z", AAPL_ID, "101.00", "101.50"),
        ],
    );

    let bars = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(bars.len(), 2);

    // Trades win where both streams cover the minute.
    assert_eq!(bars[0].provider, Provider::Trades);
    assert_eq!(bars[0].close, dec!(101));
    assert_eq!(bars[0].volume, 3);

    let filled = &bars[1];
    assert_eq!(filled.t, ts("2024-01-02T15:01:00Z"));
    assert_eq!(filled.provider, Provider::TbboFill);
    assert_eq!(filled.open, dec!(101.25));
    assert_eq!(filled.close, dec!(101.25));
    assert_eq!(filled.volume, 0);
    assert_eq!(filled.trade_count, 0);
}

#[test]
fn test_gap_fill_carries_close_forward() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 1),
            ("2024-01-02T15:03:00Z", AAPL_ID, "103", 1),
        ],
    );

    let request = day_request("AAPL", "2024-01-02").with_fill_gaps(true);
    let bars = derive_bars(&fixture, &request);

    // Nothing before the first trade; every minute after it through 23:59.
    assert_eq!(bars.first().unwrap().t, ts("2024-01-02T15:00:00Z"));
    assert_eq!(bars.last().unwrap().t, ts("2024-01-02T23:59:00Z"));
    assert_eq!(bars.len(), 9 * 60);

    assert_eq!(bars[1].provider, Provider::CarryForward);
    assert_eq!(bars[1].close, dec!(100));
    assert_eq!(bars[1].volume, 0);
    assert_eq!(bars[3].provider, Provider::Trades);
    assert_eq!(bars[4].close, dec!(103));

    let carried = bars
        .iter()
        .filter(|b| b.provider == Provider::CarryForward)
        .count();
    assert_eq!(carried, 9 * 60 - 2);
}

#[test]
fn test_resampling_conserves_volume() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T14:35:00Z", AAPL_ID, "100", 10),
            ("2024-01-02T14:59:59Z", AAPL_ID, "101", 20),
            ("2024-01-02T15:00:00Z", AAPL_ID, "99", 30),
            ("2024-01-02T15:42:00Z", AAPL_ID, "104", 40),
            ("2024-01-02T16:10:00Z", AAPL_ID, "102", 50),
        ],
    );

    let minutes = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    let hours = derive_bars(
        &fixture,
        &day_request("AAPL", "2024-01-02").with_timeframe(Timeframe::OneHour),
    );

    let total = |bars: &[CanonicalBar]| bars.iter().map(|b| b.volume).sum::<u64>();
    assert_eq!(total(&minutes), 150);
    assert_eq!(total(&hours), 150);

    assert_eq!(hours.len(), 3);
    assert_eq!(hours[0].t, ts("2024-01-02T14:00:00Z"));
    assert_eq!(hours[0].open, dec!(100));
    assert_eq!(hours[0].close, dec!(101));
    assert_eq!(hours[1].high, dec!(104));
    assert_eq!(hours[1].low, dec!(99));
    assert_eq!(hours[1].trade_count, 2);
    assert!(hours.iter().all(|b| b.timeframe == Timeframe::OneHour));
}

#[test]
fn test_daily_bar_spans_sessions() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T13:00:00Z", AAPL_ID, "99", 5),
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
            ("2024-01-02T20:30:00Z", AAPL_ID, "98", 5),
        ],
    );

    let request = day_request("AAPL", "2024-01-02").with_timeframe(Timeframe::OneDay);
    let bars = derive_bars(&fixture, &request);

    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].t, ts("2024-01-02T00:00:00Z"));
    assert_eq!(bars[0].open, dec!(99));
    assert_eq!(bars[0].close, dec!(98));
    assert_eq!(bars[0].volume, 20);
    assert!(bars[0].is_rth);
}

#[test]
fn test_daily_keys_follow_local_date() {
    let fixture = Fixture::new();
    // 00:30Z is still January 1st in New York
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T00:30:00Z", AAPL_ID, "99", 5),
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
        ],
    );

    let request = day_request("AAPL", "2024-01-02").with_timeframe(Timeframe::OneDay);
    let bars = derive_bars(&fixture, &request);

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].t, ts("2024-01-01T00:00:00Z"));
    assert_eq!(bars[0].volume, 5);
    assert_eq!(bars[1].t, ts("2024-01-02T00:00:00Z"));
    assert_eq!(bars[1].volume, 10);
    assert_ne!(bars[0].bar_id, bars[1].bar_id);
}

#[test]
fn test_rth_only_drops_extended_hours() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T13:00:00Z", AAPL_ID, "99", 5),
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
            ("2024-01-02T22:00:00Z", AAPL_ID, "98", 5),
        ],
    );

    let all = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].session, Session::Pre);
    assert_eq!(all[2].session, Session::Post);

    let rth = derive_bars(
        &fixture,
        &day_request("AAPL", "2024-01-02").with_rth_only(true),
    );
    assert_eq!(rth.len(), 1);
    assert_eq!(rth[0].t, ts("2024-01-02T15:00:00Z"));
}

#[test]
fn test_text_formats_match_parquet() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100.25", 10),
            ("2024-01-02T15:05:00Z", AAPL_ID, "100.5", 7),
        ],
    );
    fixture.write_quotes(
        "20240102",
        &[("2024-01-02T15:02:00Z", AAPL_ID, "100.30", "100.40")],
    );

    let parquet = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(parquet.len(), 3);
    for format in [OutputFormat::Csv, OutputFormat::Jsonl] {
        let request = day_request("AAPL", "2024-01-02").with_output_format(format);
        assert_eq!(derive_bars(&fixture, &request), parquet);
    }
}

#[test]
fn test_rerun_reuses_manifest() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);

    let deriver = Deriver::new(&fixture.config()).unwrap();
    let request = day_request("AAPL", "2024-01-02");
    let first = deriver.derive(&request).unwrap();

    let manifest_path = deriver
        .layout()
        .manifest_path("AAPL", 2024, Timeframe::OneMinute);
    let stored = fs::read_to_string(&manifest_path).unwrap();

    let second = deriver.derive(&request).unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&manifest_path).unwrap(), stored);

    assert_eq!(first.dataset_id, "AAPL-2024-1m");
    assert_eq!(first.from_date, date("2024-01-02"));
    assert_eq!(first.to_date, date("2024-01-02"));
    assert_eq!(first.tz, "America/New_York");
    assert_eq!(first.calendar_version, "NASDAQ-v1");
    assert!(first.input_hashes.contains_key("symbology.json"));
    assert!(first
        .input_hashes
        .contains_key("trades/xnas-itch-20240102.trades.csv.zst"));
    assert!(first.output_hashes.contains_key("bars_1Min.parquet"));
}

#[test]
fn test_changed_params_rederive() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 1),
            ("2024-01-02T15:02:00Z", AAPL_ID, "101", 1),
        ],
    );

    let deriver = Deriver::new(&fixture.config()).unwrap();
    let plain = deriver.derive(&day_request("AAPL", "2024-01-02")).unwrap();
    let filled = deriver
        .derive(&day_request("AAPL", "2024-01-02").with_fill_gaps(true))
        .unwrap();

    assert!(!plain.params.fill_gaps);
    assert!(filled.params.fill_gaps);
    assert_ne!(plain.output_hashes, filled.output_hashes);
}

#[test]
fn test_forced_rerun_is_deterministic() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 10),
            ("2024-01-02T15:00:30Z", AAPL_ID, "102", 5),
        ],
    );
    fixture.write_quotes("20240102", &[("2024-01-02T15:01:10Z", AAPL_ID, "101.00", "101.50")]);

    let deriver = Deriver::new(&fixture.config()).unwrap();
    let request = day_request("AAPL", "2024-01-02");
    let first = deriver.derive(&request).unwrap();
    let second = deriver.derive(&request.clone().with_force(true)).unwrap();

    assert_eq!(first.input_hashes, second.input_hashes);
    assert_eq!(first.output_hashes, second.output_hashes);
}

#[test]
fn test_count_surrogates_without_hashing() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);

    let mut config = fixture.config();
    config.derive.hash_inputs = false;
    let manifest = Deriver::new(&config)
        .unwrap()
        .derive(&day_request("AAPL", "2024-01-02"))
        .unwrap();

    assert_eq!(manifest.input_hashes.get("trades").map(String::as_str), Some("count:1"));
    assert_eq!(manifest.input_hashes.get("tbbo").map(String::as_str), Some("count:0"));
}

#[test]
fn test_malformed_file_is_skipped() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);
    fixture.write_raw("trades", "xnas-itch-20240103.trades.csv.zst", b"not a zstd frame");

    let request = DeriveRequest::new("AAPL", 2024)
        .with_window(Some(date("2024-01-02")), Some(date("2024-01-03")));
    let bars = derive_bars(&fixture, &request);

    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].t, ts("2024-01-02T15:00:00Z"));
}

#[test]
fn test_malformed_rows_are_dropped() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "100", 1),
            ("not-a-time", AAPL_ID, "100", 1),
            ("2024-01-02T15:01:00Z", AAPL_ID, "-5", 1),
            ("2024-01-02T15:02:00Z", AAPL_ID, "101", 2),
        ],
    );

    let bars = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(bars.len(), 2);
    assert_eq!(bars.iter().map(|b| b.volume).sum::<u64>(), 3);
}

#[test]
fn test_overflowing_notional_row_is_dropped() {
    let fixture = Fixture::new();
    fixture.write_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, "79228162514264337593543950335", 2),
            ("2024-01-02T15:00:10Z", AAPL_ID, "100", 4),
        ],
    );

    let bars = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].high, dec!(100));
    assert_eq!(bars[0].volume, 4);
}

#[test]
fn test_dbn_containers_build_bars() {
    let fixture = Fixture::new();
    fixture.write_dbn_trades(
        "20240102",
        &[
            ("2024-01-02T15:00:00Z", AAPL_ID, 100_000_000_000, 10),
            ("2024-01-02T15:00:30Z", AAPL_ID, 102_000_000_000, 5),
            ("2024-01-02T15:00:45Z", MSFT_ID, 370_000_000_000, 100),
        ],
    );
    fixture.write_dbn_quotes(
        "20240102",
        &[("2024-01-02T15:01:10Z", AAPL_ID, 101_000_000_000, 101_500_000_000)],
    );

    let bars = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].open, dec!(100));
    assert_eq!(bars[0].close, dec!(102));
    assert_eq!(bars[0].volume, 15);
    assert_eq!(bars[1].provider, Provider::TbboFill);
    assert_eq!(bars[1].close, dec!(101.25));
}

#[test]
fn test_dbn_preferred_over_csv_twin() {
    let fixture = Fixture::new();
    fixture.write_dbn_trades(
        "20240102",
        &[("2024-01-02T15:00:00Z", AAPL_ID, 100_000_000_000, 10)],
    );
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "200", 99)]);

    let bars = derive_bars(&fixture, &day_request("AAPL", "2024-01-02"));
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].close, dec!(100));
    assert_eq!(bars[0].volume, 10);
}

#[test]
fn test_no_trade_files_is_no_input_data() {
    let fixture = Fixture::new();
    fixture.write_trades("20240301", &[("2024-03-01T15:00:00Z", AAPL_ID, "100", 1)]);

    let deriver = Deriver::new(&fixture.config()).unwrap();
    let err = deriver
        .derive(&day_request("AAPL", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(err, DeriveError::NoInputData { .. }));
    assert_eq!(err.exit_code(), 4);

    let bars_path = deriver.layout().bars_path(
        "AAPL",
        2024,
        Timeframe::OneMinute,
        OutputFormat::Parquet,
    );
    assert!(!bars_path.exists());
}

#[test]
fn test_missing_symbology() {
    let fixture = Fixture::empty();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);

    let deriver = Deriver::new(&fixture.config()).unwrap();
    let err = deriver
        .derive(&day_request("AAPL", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(err, DeriveError::SymbologyMissing { ref symbol } if symbol == "AAPL"));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn test_unknown_symbol() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);

    let err = Deriver::new(&fixture.config())
        .unwrap()
        .derive(&day_request("TSLA", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(err, DeriveError::SymbologyMissing { .. }));
}

#[test]
fn test_no_ticks_for_symbol_is_empty_series() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);

    let deriver = Deriver::new(&fixture.config()).unwrap();
    let err = deriver
        .derive(&day_request("MSFT", "2024-01-02"))
        .unwrap_err();
    assert!(matches!(err, DeriveError::EmptySeries { .. }));
    assert!(DerivationManifest::load(
        &deriver
            .layout()
            .manifest_path("MSFT", 2024, Timeframe::OneMinute)
    )
    .unwrap()
    .is_none());
}

#[test]
fn test_inverted_window_rejected() {
    let fixture = Fixture::new();
    let request = DeriveRequest::new("AAPL", 2024)
        .with_window(Some(date("2024-02-01")), Some(date("2024-01-01")));
    let err = Deriver::new(&fixture.config())
        .unwrap()
        .derive(&request)
        .unwrap_err();
    assert!(matches!(err, DeriveError::InvalidWindow { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_output_lands_in_layout() {
    let fixture = Fixture::new();
    fixture.write_trades("20240102", &[("2024-01-02T15:00:00Z", AAPL_ID, "100", 1)]);

    let request = day_request("AAPL", "2024-01-02")
        .with_timeframe(Timeframe::FiveMinutes)
        .with_output_format(OutputFormat::Csv);
    Deriver::new(&fixture.config())
        .unwrap()
        .derive(&request)
        .unwrap();

    let dir = fixture.base().join("derived/bars/AAPL/2024");
    assert!(dir.join("bars_5Min.csv").is_file());
    assert!(dir.join("bars_5Min_manifest.json").is_file());
    assert_eq!(
        DataLayout::dataset_id("AAPL", 2024, Timeframe::FiveMinutes),
        "AAPL-2024-5m"
    );
}
