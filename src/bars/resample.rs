//! Timeframe resampling of canonical 1-minute bars
//!
//! Intraday timeframes floor to fixed UTC buckets. Daily bars are keyed by the
//! exchange-local calendar date so a session never straddles two buckets; the
//! emitted timestamp is that date at 00:00 UTC, one per local date.

use super::{floor_to, Adjustment, CanonicalBar, Provider, Session, Timeframe};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketKey {
    Utc(DateTime<Utc>),
    LocalDate(NaiveDate),
}

fn bucket_key(t: DateTime<Utc>, timeframe: Timeframe, tz: Tz) -> BucketKey {
    match timeframe.bucket_seconds() {
        Some(secs) => BucketKey::Utc(floor_to(t, secs)),
        None => BucketKey::LocalDate(t.with_timezone(&tz).date_naive()),
    }
}

/// Running aggregate of one output bucket
struct Bucket {
    key: BucketKey,
    t: DateTime<Utc>,
    symbol: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: u64,
    trade_count: u64,
    vwap_volume_sum: Decimal,
    vwap_sum: Decimal,
    vwap_count: u32,
    // (session, count) in order of first appearance
    sessions: Vec<(Session, usize)>,
    is_rth: bool,
    is_corrected: bool,
}

impl Bucket {
    fn open(key: BucketKey, t: DateTime<Utc>, bar: &CanonicalBar) -> Self {
        let mut bucket = Self {
            key,
            t,
            symbol: bar.symbol.clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: 0,
            trade_count: 0,
            vwap_volume_sum: Decimal::ZERO,
            vwap_sum: Decimal::ZERO,
            vwap_count: 0,
            sessions: Vec::with_capacity(2),
            is_rth: false,
            is_corrected: false,
        };
        bucket.push(bar);
        bucket
    }

    fn push(&mut self, bar: &CanonicalBar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume = self.volume.saturating_add(bar.volume);
        self.trade_count = self.trade_count.saturating_add(bar.trade_count);
        if let Some(vwap) = bar.vwap {
            let weighted = vwap.saturating_mul(Decimal::from(bar.volume));
            self.vwap_volume_sum = self.vwap_volume_sum.saturating_add(weighted);
            self.vwap_sum = self.vwap_sum.saturating_add(vwap);
            self.vwap_count += 1;
        }
        match self.sessions.iter_mut().find(|(s, _)| *s == bar.session) {
            Some((_, count)) => *count += 1,
            None => self.sessions.push((bar.session, 1)),
        }
        self.is_rth |= bar.is_rth;
        self.is_corrected |= bar.is_corrected;
    }

    fn session(&self) -> Session {
        // Ties keep the first occurrence.
        let mut best = (Session::Off, 0usize);
        for &(session, count) in &self.sessions {
            if count > best.1 {
                best = (session, count);
            }
        }
        best.0
    }

    fn vwap(&self) -> Option<Decimal> {
        if self.volume > 0 {
            Some(self.vwap_volume_sum / Decimal::from(self.volume))
        } else if self.vwap_count > 0 {
            Some(self.vwap_sum / Decimal::from(self.vwap_count))
        } else {
            None
        }
    }

    fn finish(self, timeframe: Timeframe) -> CanonicalBar {
        let provider = if self.volume > 0 {
            Provider::Trades
        } else {
            Provider::TbboFill
        };
        CanonicalBar {
            bar_id: CanonicalBar::make_id(&self.symbol, self.t, timeframe),
            session: self.session(),
            vwap: self.vwap(),
            symbol: self.symbol,
            t: self.t,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
            timeframe,
            is_rth: self.is_rth,
            adjustment: Adjustment::Unadjusted,
            provider,
            is_corrected: self.is_corrected,
        }
    }
}

/// Aggregate a sorted 1-minute series into `timeframe` buckets
///
/// Buckets without input rows are never emitted. `1Min` returns the input
/// unchanged.
pub fn resample(bars: &[CanonicalBar], timeframe: Timeframe, tz: Tz) -> Vec<CanonicalBar> {
    if timeframe == Timeframe::OneMinute {
        return bars.to_vec();
    }

    let mut out = Vec::new();
    let mut current: Option<Bucket> = None;

    for bar in bars {
        let key = bucket_key(bar.t, timeframe, tz);
        match current.as_mut() {
            Some(bucket) if bucket.key == key => bucket.push(bar),
            _ => {
                let t = match key {
                    BucketKey::Utc(t) => t,
                    BucketKey::LocalDate(date) => date.and_time(NaiveTime::MIN).and_utc(),
                };
                if let Some(done) = current.replace(Bucket::open(key, t, bar)) {
                    out.push(done.finish(timeframe));
                }
            }
        }
    }
    if let Some(done) = current {
        out.push(done.finish(timeframe));
    }

    out
}
