//! Parquet encoding of canonical bars

use super::WriteError;
use crate::bars::{Adjustment, CanonicalBar};
use arrow::array::{
    Array, ArrayRef, BooleanArray, StringArray, TimestampMicrosecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Rows per record batch
const BATCH_SIZE: usize = 64 * 1024;

/// Bar schema; field names match [`CanonicalBar`]
pub fn bar_schema() -> Schema {
    Schema::new(vec![
        Field::new("symbol", DataType::Utf8, false),
        Field::new(
            "t",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("open", DataType::Utf8, false), // Decimal as string
        Field::new("high", DataType::Utf8, false),
        Field::new("low", DataType::Utf8, false),
        Field::new("close", DataType::Utf8, false),
        Field::new("volume", DataType::UInt64, false),
        Field::new("trade_count", DataType::UInt64, false),
        Field::new("vwap", DataType::Utf8, true),
        Field::new("timeframe", DataType::Utf8, false),
        Field::new("session", DataType::Utf8, false),
        Field::new("is_rth", DataType::Boolean, false),
        Field::new("adjustment", DataType::Utf8, false),
        Field::new("provider", DataType::Utf8, false),
        Field::new("is_corrected", DataType::Boolean, false),
        Field::new("bar_id", DataType::Utf8, false),
    ])
}

fn bar_batch(schema: Arc<Schema>, bars: &[CanonicalBar]) -> Result<RecordBatch, WriteError> {
    let strings = |f: fn(&CanonicalBar) -> String| -> ArrayRef {
        Arc::new(StringArray::from(bars.iter().map(f).collect::<Vec<_>>()))
    };

    let timestamps: Vec<i64> = bars.iter().map(|b| b.t.timestamp_micros()).collect();
    let vwaps: Vec<Option<String>> = bars.iter().map(|b| b.vwap.map(|v| v.to_string())).collect();

    let columns: Vec<ArrayRef> = vec![
        strings(|b| b.symbol.clone()),
        Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
        strings(|b| b.open.to_string()),
        strings(|b| b.high.to_string()),
        strings(|b| b.low.to_string()),
        strings(|b| b.close.to_string()),
        Arc::new(UInt64Array::from(bars.iter().map(|b| b.volume).collect::<Vec<_>>())),
        Arc::new(UInt64Array::from(
            bars.iter().map(|b| b.trade_count).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(vwaps)),
        strings(|b| b.timeframe.label().to_string()),
        strings(|b| b.session.as_str().to_string()),
        Arc::new(BooleanArray::from(bars.iter().map(|b| b.is_rth).collect::<Vec<_>>())),
        strings(|b| b.adjustment.as_str().to_string()),
        strings(|b| b.provider.as_str().to_string()),
        Arc::new(BooleanArray::from(
            bars.iter().map(|b| b.is_corrected).collect::<Vec<_>>(),
        )),
        strings(|b| b.bar_id.clone()),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Encode `bars` as a single parquet file into `out`
pub fn write_parquet<W: Write + Send>(out: W, bars: &[CanonicalBar]) -> Result<(), WriteError> {
    let schema = Arc::new(bar_schema());
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(out, schema.clone(), Some(props))?;
    for chunk in bars.chunks(BATCH_SIZE) {
        writer.write(&bar_batch(schema.clone(), chunk)?)?;
    }
    writer.close()?;
    Ok(())
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Invalid {name} column"))
}

/// Read every bar from a parquet bar file
pub fn read_parquet(path: &Path) -> anyhow::Result<Vec<CanonicalBar>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut bars = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;

        let symbol = column::<StringArray>(&batch, "symbol")?;
        let t = column::<TimestampMicrosecondArray>(&batch, "t")?;
        let open = column::<StringArray>(&batch, "open")?;
        let high = column::<StringArray>(&batch, "high")?;
        let low = column::<StringArray>(&batch, "low")?;
        let close = column::<StringArray>(&batch, "close")?;
        let volume = column::<UInt64Array>(&batch, "volume")?;
        let trade_count = column::<UInt64Array>(&batch, "trade_count")?;
        let vwap = column::<StringArray>(&batch, "vwap")?;
        let timeframe = column::<StringArray>(&batch, "timeframe")?;
        let session = column::<StringArray>(&batch, "session")?;
        let is_rth = column::<BooleanArray>(&batch, "is_rth")?;
        let provider = column::<StringArray>(&batch, "provider")?;
        let is_corrected = column::<BooleanArray>(&batch, "is_corrected")?;
        let bar_id = column::<StringArray>(&batch, "bar_id")?;

        for i in 0..batch.num_rows() {
            bars.push(CanonicalBar {
                symbol: symbol.value(i).to_string(),
                t: DateTime::from_timestamp_micros(t.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?,
                open: Decimal::from_str(open.value(i))?,
                high: Decimal::from_str(high.value(i))?,
                low: Decimal::from_str(low.value(i))?,
                close: Decimal::from_str(close.value(i))?,
                volume: volume.value(i),
                trade_count: trade_count.value(i),
                vwap: if vwap.is_null(i) {
                    None
                } else {
                    Some(Decimal::from_str(vwap.value(i))?)
                },
                timeframe: timeframe.value(i).parse()?,
                session: session.value(i).parse().map_err(anyhow::Error::msg)?,
                is_rth: is_rth.value(i),
                adjustment: Adjustment::Unadjusted,
                provider: provider.value(i).parse().map_err(anyhow::Error::msg)?,
                is_corrected: is_corrected.value(i),
                bar_id: bar_id.value(i).to_string(),
            });
        }
    }

    Ok(bars)
}
