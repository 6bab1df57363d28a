//! Streaming decoder for tick containers
//!
//! DBN containers go through [`super::binary`]; CSV containers are decoded
//! here. Both share the row validation below.

use super::binary;
use super::{InstrumentId, QuoteTick, RowStats, TickEncoding, TickError, TickFile, TradeTick};
use chrono::{DateTime, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::str::FromStr;

/// Scale of Databento fixed-point prices (1e-9)
const FIXED_PRICE_SCALE: u32 = 9;

/// Convert a Databento fixed-point price; `None` for the undefined sentinel
pub(super) fn fixed_price(raw: i64) -> Option<Decimal> {
    if raw == dbn::UNDEF_PRICE {
        return None;
    }
    Some(Decimal::from_i128_with_scale(i128::from(raw), FIXED_PRICE_SCALE).normalize())
}

/// Accept a trade whose notional is representable
pub(super) fn check_notional(price: Decimal, size: u64, line: u64) -> Result<(), TickError> {
    price
        .checked_mul(Decimal::from(size))
        .map(|_| ())
        .ok_or_else(|| TickError::row(line, "price × size overflows"))
}

/// Accept a quote whose mid is representable
pub(super) fn check_mid(bid: Decimal, ask: Decimal, line: u64) -> Result<(), TickError> {
    bid.checked_add(ask)
        .map(|_| ())
        .ok_or_else(|| TickError::row(line, "bid + ask overflows"))
}

/// Reader options
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReaderOptions {
    /// Prices are integers scaled by 1e-9 instead of decimal strings
    pub fixed_point_prices: bool,
}

/// Column positions for the trades stream
struct TradeColumns {
    ts_event: usize,
    instrument_id: usize,
    price: usize,
    size: usize,
}

/// Column positions for the quotes stream
struct QuoteColumns {
    ts_event: usize,
    instrument_id: usize,
    bid: usize,
    ask: usize,
}

/// Decodes tick containers into typed records, one instrument at a time
#[derive(Debug, Clone, Default)]
pub struct TickReader {
    options: TickReaderOptions,
}

impl TickReader {
    /// Create a reader with the given options
    pub fn new(options: TickReaderOptions) -> Self {
        Self { options }
    }

    /// Stream every valid trade of `instrument_id` in `file` into `on_tick`
    ///
    /// Malformed rows are dropped and counted. A file-level failure is
    /// returned as [`TickError::MalformedFile`]; ticks already delivered from
    /// that file must then be discarded by the caller.
    pub fn read_trades<F>(
        &self,
        file: &TickFile,
        instrument_id: InstrumentId,
        on_tick: F,
    ) -> Result<RowStats, TickError>
    where
        F: FnMut(TradeTick),
    {
        match file.encoding {
            TickEncoding::Dbn => binary::read_trades(file, instrument_id, on_tick),
            TickEncoding::Csv => self.read_csv_trades(file, instrument_id, on_tick),
        }
    }

    /// Stream every valid quote of `instrument_id` in `file` into `on_tick`
    pub fn read_quotes<F>(
        &self,
        file: &TickFile,
        instrument_id: InstrumentId,
        on_tick: F,
    ) -> Result<RowStats, TickError>
    where
        F: FnMut(QuoteTick),
    {
        match file.encoding {
            TickEncoding::Dbn => binary::read_quotes(file, instrument_id, on_tick),
            TickEncoding::Csv => self.read_csv_quotes(file, instrument_id, on_tick),
        }
    }

    fn read_csv_trades<F>(
        &self,
        file: &TickFile,
        instrument_id: InstrumentId,
        mut on_tick: F,
    ) -> Result<RowStats, TickError>
    where
        F: FnMut(TradeTick),
    {
        let mut reader = open_container(file)?;
        let headers = reader
            .headers()
            .map_err(|e| TickError::file(&file.path, e))?
            .clone();
        let cols = TradeColumns {
            ts_event: column(&headers, file, "ts_event")?,
            instrument_id: column(&headers, file, "instrument_id")?,
            price: column(&headers, file, "price")?,
            size: column(&headers, file, "size")?,
        };

        self.for_each_row(file, &mut reader, |record, line| {
            let id = parse_instrument(record, cols.instrument_id, line)?;
            if id != instrument_id {
                return Ok(None);
            }
            let ts = field(record, cols.ts_event)
                .and_then(parse_ts)
                .ok_or_else(|| TickError::row(line, "missing or invalid ts_event"))?;
            let price = field(record, cols.price)
                .and_then(|s| self.parse_price(s))
                .filter(|p| *p > Decimal::ZERO)
                .ok_or_else(|| TickError::row(line, "missing or invalid price"))?;
            let size = field(record, cols.size)
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| TickError::row(line, "missing or invalid size"))?;
            check_notional(price, size, line)?;

            on_tick(TradeTick {
                ts,
                price,
                size,
                instrument_id: id,
            });
            Ok(Some(()))
        })
    }

    fn read_csv_quotes<F>(
        &self,
        file: &TickFile,
        instrument_id: InstrumentId,
        mut on_tick: F,
    ) -> Result<RowStats, TickError>
    where
        F: FnMut(QuoteTick),
    {
        let mut reader = open_container(file)?;
        let headers = reader
            .headers()
            .map_err(|e| TickError::file(&file.path, e))?
            .clone();
        let cols = QuoteColumns {
            ts_event: column(&headers, file, "ts_event")?,
            instrument_id: column(&headers, file, "instrument_id")?,
            bid: column(&headers, file, "bid_px_00")?,
            ask: column(&headers, file, "ask_px_00")?,
        };

        self.for_each_row(file, &mut reader, |record, line| {
            let id = parse_instrument(record, cols.instrument_id, line)?;
            if id != instrument_id {
                return Ok(None);
            }
            let ts = field(record, cols.ts_event)
                .and_then(parse_ts)
                .ok_or_else(|| TickError::row(line, "missing or invalid ts_event"))?;
            let bid_price = field(record, cols.bid)
                .and_then(|s| self.parse_price(s))
                .filter(|p| *p > Decimal::ZERO)
                .ok_or_else(|| TickError::row(line, "missing or invalid bid"))?;
            let ask_price = field(record, cols.ask)
                .and_then(|s| self.parse_price(s))
                .filter(|p| *p > Decimal::ZERO)
                .ok_or_else(|| TickError::row(line, "missing or invalid ask"))?;
            check_mid(bid_price, ask_price, line)?;

            on_tick(QuoteTick {
                ts,
                bid_price,
                ask_price,
                instrument_id: id,
            });
            Ok(Some(()))
        })
    }

    /// Drive `handle` over every record, classifying the outcome of each row
    ///
    /// `handle` returns `Ok(Some(()))` for an accepted row, `Ok(None)` for a
    /// row of another instrument and `Err` for a malformed row.
    fn for_each_row<R, H>(
        &self,
        file: &TickFile,
        reader: &mut csv::Reader<R>,
        mut handle: H,
    ) -> Result<RowStats, TickError>
    where
        R: Read,
        H: FnMut(&StringRecord, u64) -> Result<Option<()>, TickError>,
    {
        let mut stats = RowStats::default();
        let mut record = StringRecord::new();

        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(TickError::file(&file.path, e)),
                Err(e) => {
                    stats.skipped += 1;
                    tracing::trace!(file = ?file.path, error = %e, "Dropping undecodable row");
                    continue;
                }
            }

            let line = record.position().map(|p| p.line()).unwrap_or_default();
            match handle(&record, line) {
                Ok(Some(())) => stats.accepted += 1,
                Ok(None) => stats.filtered += 1,
                Err(e) => {
                    stats.skipped += 1;
                    tracing::trace!(file = ?file.path, error = %e, "Dropping malformed row");
                }
            }
        }

        Ok(stats)
    }

    fn parse_price(&self, s: &str) -> Option<Decimal> {
        if self.options.fixed_point_prices {
            s.parse::<i64>().ok().and_then(fixed_price)
        } else {
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
    }
}

fn open_container(file: &TickFile) -> Result<csv::Reader<impl Read>, TickError> {
    let handle = File::open(&file.path).map_err(|e| TickError::file(&file.path, e))?;
    let decoder = zstd::stream::read::Decoder::new(handle).map_err(|e| TickError::file(&file.path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(decoder))
}

fn column(headers: &StringRecord, file: &TickFile, name: &str) -> Result<usize, TickError> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        TickError::file(
            &file.path,
            format!("{} container has no `{}` column", file.kind, name),
        )
    })
}

fn field(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).filter(|s| !s.is_empty())
}

fn parse_instrument(record: &StringRecord, idx: usize, line: u64) -> Result<InstrumentId, TickError> {
    field(record, idx)
        .and_then(|s| s.parse::<InstrumentId>().ok())
        .ok_or_else(|| TickError::row(line, "missing or invalid instrument_id"))
}

/// Parse `ts_event` as integer UTC nanoseconds or RFC 3339 text
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let nanos = s.parse::<i64>().ok()?;
        Some(DateTime::from_timestamp_nanos(nanos))
    } else {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}
