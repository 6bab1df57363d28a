//! Per-minute reduction of tick streams
//!
//! Each container is reduced on its own into a [`MinuteTable`]; tables from
//! different files are combined later with the same first/max/min/last/sum
//! reducers, keyed by minute.

use super::floor_to;
use crate::ticks::{InstrumentId, QuoteTick, RowStats, TickError, TickFile, TickReader, TradeTick};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::btree_map::{self, Entry};
use std::collections::BTreeMap;

/// A per-minute partial that can absorb another partial for the same minute
pub trait MinutePartial: Sized {
    /// Start of the minute this partial covers
    fn minute(&self) -> DateTime<Utc>;
    /// Fold `other` (same minute) into `self`
    fn absorb(&mut self, other: Self);
}

/// Trade statistics for one minute
#[derive(Debug, Clone, PartialEq)]
pub struct TradeMinute {
    pub minute: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub trade_count: u64,
    /// Sum of price × size
    pub price_volume_sum: Decimal,
    first_ts: DateTime<Utc>,
    last_ts: DateTime<Utc>,
}

impl TradeMinute {
    fn from_tick(tick: &TradeTick) -> Self {
        Self {
            minute: floor_to(tick.ts, 60),
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.size,
            trade_count: 1,
            price_volume_sum: tick.price.saturating_mul(Decimal::from(tick.size)),
            first_ts: tick.ts,
            last_ts: tick.ts,
        }
    }

    /// Volume-weighted price, undefined without volume
    pub fn vwap(&self) -> Option<Decimal> {
        if self.volume > 0 {
            Some(self.price_volume_sum / Decimal::from(self.volume))
        } else {
            None
        }
    }
}

impl MinutePartial for TradeMinute {
    fn minute(&self) -> DateTime<Utc> {
        self.minute
    }

    fn absorb(&mut self, other: Self) {
        // Equal timestamps keep arrival order: earlier open, later close.
        if other.first_ts < self.first_ts {
            self.open = other.open;
            self.first_ts = other.first_ts;
        }
        if other.last_ts >= self.last_ts {
            self.close = other.close;
            self.last_ts = other.last_ts;
        }
        self.high = self.high.max(other.high);
        self.low = self.low.min(other.low);
        self.volume = self.volume.saturating_add(other.volume);
        self.trade_count = self.trade_count.saturating_add(other.trade_count);
        self.price_volume_sum = self.price_volume_sum.saturating_add(other.price_volume_sum);
    }
}

/// Quote mid statistics for one minute
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteMinute {
    pub minute: DateTime<Utc>,
    /// Mid of the earliest quote in the minute
    pub mid_first: Decimal,
    mid_sum: Decimal,
    mid_count: u64,
    first_ts: DateTime<Utc>,
}

impl QuoteMinute {
    fn from_tick(tick: &QuoteTick) -> Self {
        Self {
            minute: floor_to(tick.ts, 60),
            mid_first: tick.mid(),
            mid_sum: tick.mid(),
            mid_count: 1,
            first_ts: tick.ts,
        }
    }

    /// Mean of every mid observed in the minute
    pub fn mid_mean(&self) -> Decimal {
        self.mid_sum / Decimal::from(self.mid_count)
    }

    /// Number of quotes observed in the minute
    pub fn quote_count(&self) -> u64 {
        self.mid_count
    }
}

impl MinutePartial for QuoteMinute {
    fn minute(&self) -> DateTime<Utc> {
        self.minute
    }

    fn absorb(&mut self, other: Self) {
        if other.first_ts < self.first_ts {
            self.mid_first = other.mid_first;
            self.first_ts = other.first_ts;
        }
        self.mid_sum = self.mid_sum.saturating_add(other.mid_sum);
        self.mid_count = self.mid_count.saturating_add(other.mid_count);
    }
}

/// Minute-keyed table of partials, at most one row per minute
#[derive(Debug, Clone)]
pub struct MinuteTable<P> {
    rows: BTreeMap<DateTime<Utc>, P>,
}

impl<P> Default for MinuteTable<P> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<P: MinutePartial> MinuteTable<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a partial, folding it into an existing row for the same minute
    pub fn insert(&mut self, partial: P) {
        match self.rows.entry(partial.minute()) {
            Entry::Occupied(mut row) => row.get_mut().absorb(partial),
            Entry::Vacant(slot) => {
                slot.insert(partial);
            }
        }
    }

    /// Fold every row of `other` into this table
    pub fn merge(&mut self, other: MinuteTable<P>) {
        for (_, partial) in other.rows {
            self.insert(partial);
        }
    }

    pub fn get(&self, minute: &DateTime<Utc>) -> Option<&P> {
        self.rows.get(minute)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in ascending minute order
    pub fn iter(&self) -> btree_map::Iter<'_, DateTime<Utc>, P> {
        self.rows.iter()
    }

    /// Minute keys in ascending order
    pub fn minutes(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.rows.keys()
    }
}

impl MinuteTable<TradeMinute> {
    /// Add one trade print
    pub fn add_trade(&mut self, tick: &TradeTick) {
        self.insert(TradeMinute::from_tick(tick));
    }
}

impl MinuteTable<QuoteMinute> {
    /// Add one quote update
    pub fn add_quote(&mut self, tick: &QuoteTick) {
        self.insert(QuoteMinute::from_tick(tick));
    }
}

/// Reduce one trades container to per-minute trade statistics
pub fn aggregate_trade_file(
    reader: &TickReader,
    file: &TickFile,
    instrument_id: InstrumentId,
) -> Result<(MinuteTable<TradeMinute>, RowStats), TickError> {
    let mut table: MinuteTable<TradeMinute> = MinuteTable::new();
    let stats = reader.read_trades(file, instrument_id, |tick| table.add_trade(&tick))?;
    Ok((table, stats))
}

/// Reduce one quotes container to per-minute mid statistics
pub fn aggregate_quote_file(
    reader: &TickReader,
    file: &TickFile,
    instrument_id: InstrumentId,
) -> Result<(MinuteTable<QuoteMinute>, RowStats), TickError> {
    let mut table: MinuteTable<QuoteMinute> = MinuteTable::new();
    let stats = reader.read_quotes(file, instrument_id, |tick| table.add_quote(&tick))?;
    Ok((table, stats))
}
