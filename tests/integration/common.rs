//! Shared fixtures: a throwaway data root with tick containers

use chrono::{DateTime, NaiveDate, Utc};
use dbn::encode::{DbnEncodable, DbnEncoder, EncodeRecord};
use dbn::{Mbp1Msg, MetadataBuilder, SType, Schema, TradeMsg};
use hewston_bars::config::Config;
use hewston_bars::pipeline::DeriveRequest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const AAPL_ID: u32 = 38;
pub const MSFT_ID: u32 = 7;

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Data root with a symbology table for AAPL and MSFT
    pub fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        fixture.write_raw(
            "trades",
            "symbology.json",
            format!(
                r#"{{"result": {{
                    "AAPL": [{{"d0": "2024-01-01", "d1": "2024-12-31", "s": "{AAPL_ID}"}}],
                    "MSFT": [{{"d0": "2024-01-01", "d1": "2024-12-31", "s": "{MSFT_ID}"}}]
                }}}}"#
            )
            .as_bytes(),
        );
        fixture
    }

    /// Data root without any files
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> Config {
        Config::default().with_base_dir(Some(self.base().to_path_buf()))
    }

    pub fn stream_dir(&self, kind: &str) -> PathBuf {
        self.base().join("raw").join("databento").join(kind)
    }

    pub fn write_raw(&self, kind: &str, name: &str, bytes: &[u8]) {
        let dir = self.stream_dir(kind);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), bytes).unwrap();
    }

    /// Trades container for `day` (YYYYMMDD): rows of (ts, instrument, price, size)
    pub fn write_trades(&self, day: &str, rows: &[(&str, u32, &str, u64)]) {
        let mut csv = String::from("ts_event,instrument_id,price,size\n");
        for (ts, id, price, size) in rows {
            csv.push_str(&format!("{ts},{id},{price},{size}\n"));
        }
        let bytes = zstd::encode_all(csv.as_bytes(), 3).unwrap();
        self.write_raw("trades", &format!("xnas-itch-{day}.trades.csv.zst"), &bytes);
    }

    /// TBBO container for `day` (YYYYMMDD): rows of (ts, instrument, bid, ask)
    pub fn write_quotes(&self, day: &str, rows: &[(&str, u32, &str, &str)]) {
        let mut csv = String::from("ts_event,instrument_id,bid_px_00,ask_px_00\n");
        for (ts, id, bid, ask) in rows {
            csv.push_str(&format!("{ts},{id},{bid},{ask}\n"));
        }
        let bytes = zstd::encode_all(csv.as_bytes(), 3).unwrap();
        self.write_raw("tbbo", &format!("xnas-itch-{day}.tbbo.csv.zst"), &bytes);
    }

    /// DBN trades container for `day`: rows of (ts, instrument, 1e-9 price, size)
    pub fn write_dbn_trades(&self, day: &str, rows: &[(&str, u32, i64, u32)]) {
        let records: Vec<TradeMsg> = rows
            .iter()
            .map(|(at, id, price, size)| {
                let mut record = TradeMsg::default();
                record.hd.ts_event = nanos(at);
                record.hd.instrument_id = *id;
                record.price = *price;
                record.size = *size;
                record
            })
            .collect();
        let bytes = encode_dbn(Schema::Trades, &records);
        self.write_raw("trades", &format!("xnas-itch-{day}.trades.dbn.zst"), &bytes);
    }

    /// DBN TBBO container for `day`: rows of (ts, instrument, 1e-9 bid, 1e-9 ask)
    pub fn write_dbn_quotes(&self, day: &str, rows: &[(&str, u32, i64, i64)]) {
        let records: Vec<Mbp1Msg> = rows
            .iter()
            .map(|(at, id, bid, ask)| {
                let mut record = Mbp1Msg::default();
                record.hd.ts_event = nanos(at);
                record.hd.instrument_id = *id;
                record.levels[0].bid_px = *bid;
                record.levels[0].ask_px = *ask;
                record
            })
            .collect();
        let bytes = encode_dbn(Schema::Mbp1, &records);
        self.write_raw("tbbo", &format!("xnas-itch-{day}.tbbo.dbn.zst"), &bytes);
    }
}

fn nanos(s: &str) -> u64 {
    ts(s).timestamp_nanos_opt().unwrap() as u64
}

fn encode_dbn<R: DbnEncodable>(schema: Schema, records: &[R]) -> Vec<u8> {
    let metadata = MetadataBuilder::new()
        .dataset("XNAS.ITCH".to_owned())
        .schema(Some(schema))
        .start(0)
        .stype_in(Some(SType::RawSymbol))
        .stype_out(SType::InstrumentId)
        .build();
    let mut buf = Vec::new();
    {
        let mut encoder = DbnEncoder::new(&mut buf, &metadata).unwrap();
        for record in records {
            encoder.encode_record(record).unwrap();
        }
        encoder.flush().unwrap();
    }
    zstd::encode_all(buf.as_slice(), 3).unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Request for a single day of 2024
pub fn day_request(symbol: &str, day: &str) -> DeriveRequest {
    DeriveRequest::new(symbol, 2024).with_window(Some(date(day)), Some(date(day)))
}
