//! Exchange session labeling
//!
//! Sessions are always re-derived from the UTC timestamp through the exchange
//! time zone, so DST transitions follow the tz database.

use super::{Adjustment, CanonicalBar, MinuteBar, Session, Timeframe};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

const PRE_OPEN: u32 = 4 * 60;
const REGULAR_OPEN: u32 = 9 * 60 + 30;
const REGULAR_CLOSE: u32 = 16 * 60;
const POST_CLOSE: u32 = 20 * 60;

/// Classify an exchange-local wall-clock time
pub fn classify(local: NaiveTime) -> Session {
    let minute_of_day = local.hour() * 60 + local.minute();
    match minute_of_day {
        m if (PRE_OPEN..REGULAR_OPEN).contains(&m) => Session::Pre,
        m if (REGULAR_OPEN..REGULAR_CLOSE).contains(&m) => Session::Regular,
        m if (REGULAR_CLOSE..POST_CLOSE).contains(&m) => Session::Post,
        _ => Session::Off,
    }
}

/// Attaches symbol, session and id to reconciled minute bars
#[derive(Debug, Clone)]
pub struct SessionLabeler {
    tz: Tz,
}

impl Default for SessionLabeler {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York)
    }
}

impl SessionLabeler {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Session of the instant `ts` in the exchange time zone
    pub fn session_at(&self, ts: DateTime<Utc>) -> Session {
        classify(ts.with_timezone(&self.tz).time())
    }

    /// Convert one minute bar into a 1Min canonical bar
    pub fn label(&self, symbol: &str, bar: MinuteBar) -> CanonicalBar {
        let session = self.session_at(bar.t);
        CanonicalBar {
            symbol: symbol.to_string(),
            t: bar.t,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            trade_count: bar.trade_count,
            vwap: bar.vwap,
            timeframe: Timeframe::OneMinute,
            session,
            is_rth: session == Session::Regular,
            adjustment: Adjustment::Unadjusted,
            provider: bar.provider,
            is_corrected: bar.is_corrected,
            bar_id: CanonicalBar::make_id(symbol, bar.t, Timeframe::OneMinute),
        }
    }

    pub fn label_all(&self, symbol: &str, bars: Vec<MinuteBar>) -> Vec<CanonicalBar> {
        bars.into_iter().map(|bar| self.label(symbol, bar)).collect()
    }
}
