//! DBN container decoding
//!
//! Trades containers hold `TradeMsg` records and TBBO containers hold
//! `Mbp1Msg` records. Records of another type count as malformed rows.

use super::reader::{check_mid, check_notional, fixed_price};
use super::{InstrumentId, QuoteTick, RowStats, TickError, TickFile, TradeTick};
use chrono::{DateTime, Utc};
use dbn::decode::{DbnDecoder, DecodeRecordRef};
use dbn::{HasRType, Mbp1Msg, RecordRef, TradeMsg, UNDEF_TIMESTAMP};
use rust_decimal::Decimal;

/// Stream every valid trade of `instrument_id` in a DBN trades container
pub(super) fn read_trades<F>(
    file: &TickFile,
    instrument_id: InstrumentId,
    mut on_tick: F,
) -> Result<RowStats, TickError>
where
    F: FnMut(TradeTick),
{
    for_each_record(file, |record: &TradeMsg, line| {
        if record.hd.instrument_id != instrument_id {
            return Ok(None);
        }
        let ts = timestamp(record.hd.ts_event)
            .ok_or_else(|| TickError::row(line, "missing or invalid ts_event"))?;
        let price = positive_price(record.price)
            .ok_or_else(|| TickError::row(line, "missing or invalid price"))?;
        let size = u64::from(record.size);
        check_notional(price, size, line)?;

        on_tick(TradeTick {
            ts,
            price,
            size,
            instrument_id: record.hd.instrument_id,
        });
        Ok(Some(()))
    })
}

/// Stream every valid quote of `instrument_id` in a DBN TBBO container
pub(super) fn read_quotes<F>(
    file: &TickFile,
    instrument_id: InstrumentId,
    mut on_tick: F,
) -> Result<RowStats, TickError>
where
    F: FnMut(QuoteTick),
{
    for_each_record(file, |record: &Mbp1Msg, line| {
        if record.hd.instrument_id != instrument_id {
            return Ok(None);
        }
        let ts = timestamp(record.hd.ts_event)
            .ok_or_else(|| TickError::row(line, "missing or invalid ts_event"))?;
        let level = &record.levels[0];
        let bid_price = positive_price(level.bid_px)
            .ok_or_else(|| TickError::row(line, "missing or invalid bid"))?;
        let ask_price = positive_price(level.ask_px)
            .ok_or_else(|| TickError::row(line, "missing or invalid ask"))?;
        check_mid(bid_price, ask_price, line)?;

        on_tick(QuoteTick {
            ts,
            bid_price,
            ask_price,
            instrument_id: record.hd.instrument_id,
        });
        Ok(Some(()))
    })
}

/// Decode every record of type `T`, classifying the outcome the same way the
/// CSV path does. `line` is the 1-based record index.
fn for_each_record<T, H>(file: &TickFile, mut handle: H) -> Result<RowStats, TickError>
where
    T: HasRType,
    H: FnMut(&T, u64) -> Result<Option<()>, TickError>,
{
    let mut decoder =
        DbnDecoder::from_zstd_file(&file.path).map_err(|e| TickError::file(&file.path, e))?;
    let mut stats = RowStats::default();
    let mut line = 0u64;

    loop {
        let record: RecordRef = match decoder.decode_record_ref() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => return Err(TickError::file(&file.path, e)),
        };
        line += 1;

        let outcome = match record.get::<T>() {
            Some(typed) => handle(typed, line),
            None => Err(TickError::row(
                line,
                format!("unexpected record type in {} container", file.kind),
            )),
        };
        match outcome {
            Ok(Some(())) => stats.accepted += 1,
            Ok(None) => stats.filtered += 1,
            Err(e) => {
                stats.skipped += 1;
                tracing::trace!(file = ?file.path, error = %e, "Dropping malformed record");
            }
        }
    }

    Ok(stats)
}

fn timestamp(nanos: u64) -> Option<DateTime<Utc>> {
    if nanos == UNDEF_TIMESTAMP {
        return None;
    }
    i64::try_from(nanos).ok().map(DateTime::from_timestamp_nanos)
}

fn positive_price(raw: i64) -> Option<Decimal> {
    fixed_price(raw).filter(|p| *p > Decimal::ZERO)
}
