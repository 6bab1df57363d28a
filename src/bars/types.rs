//! Bar types shared by every derivation stage

use crate::pipeline::DeriveError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1Min")]
    OneMinute,
    #[serde(rename = "5Min")]
    FiveMinutes,
    #[serde(rename = "15Min")]
    FifteenMinutes,
    #[serde(rename = "1Hour")]
    OneHour,
    #[serde(rename = "1Day")]
    OneDay,
}

impl Timeframe {
    /// All supported timeframes, finest first
    pub const ALL: [Timeframe; 5] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::OneDay,
    ];

    /// Label used in file names and bar ids (e.g. "5Min")
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1Min",
            Timeframe::FiveMinutes => "5Min",
            Timeframe::FifteenMinutes => "15Min",
            Timeframe::OneHour => "1Hour",
            Timeframe::OneDay => "1Day",
        }
    }

    /// Short form used in dataset ids (e.g. "5m")
    pub fn short(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Fixed UTC bucket width in seconds; `None` for exchange-calendar days
    pub fn bucket_seconds(&self) -> Option<i64> {
        match self {
            Timeframe::OneMinute => Some(60),
            Timeframe::FiveMinutes => Some(300),
            Timeframe::FifteenMinutes => Some(900),
            Timeframe::OneHour => Some(3600),
            Timeframe::OneDay => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = DeriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1Min" | "1m" | "1min" => Ok(Timeframe::OneMinute),
            "5Min" | "5m" | "5min" => Ok(Timeframe::FiveMinutes),
            "15Min" | "15m" | "15min" => Ok(Timeframe::FifteenMinutes),
            "1Hour" | "1h" | "1hour" => Ok(Timeframe::OneHour),
            "1Day" | "1d" | "1day" => Ok(Timeframe::OneDay),
            other => Err(DeriveError::UnsupportedTimeframe(other.to_string())),
        }
    }
}

/// Trading session of a bar, by exchange-local wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Pre,
    Regular,
    Post,
    Off,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Pre => "pre",
            Session::Regular => "regular",
            Session::Post => "post",
            Session::Off => "off",
        }
    }
}

impl FromStr for Session {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Session::Pre),
            "regular" => Ok(Session::Regular),
            "post" => Ok(Session::Post),
            "off" => Ok(Session::Off),
            other => Err(format!("unknown session: {other}")),
        }
    }
}

/// Which source produced a bar's prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// At least one trade printed in the bucket
    Trades,
    /// Flat bar synthesized from the top-of-book mid
    TbboFill,
    /// Flat bar repeating the previous close
    CarryForward,
    Unknown,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Trades => "trades",
            Provider::TbboFill => "tbbo_fill",
            Provider::CarryForward => "carry_forward",
            Provider::Unknown => "unknown",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trades" => Ok(Provider::Trades),
            "tbbo_fill" => Ok(Provider::TbboFill),
            "carry_forward" => Ok(Provider::CarryForward),
            "unknown" => Ok(Provider::Unknown),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Corporate-action adjustment applied to prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    #[default]
    Unadjusted,
}

impl Adjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjustment::Unadjusted => "unadjusted",
        }
    }
}

/// A reconciled one-minute bar before symbol and session are attached
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteBar {
    /// Minute start (UTC)
    pub t: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub trade_count: u64,
    pub vwap: Option<Decimal>,
    pub provider: Provider,
    pub is_corrected: bool,
}

impl MinuteBar {
    /// Flat bar at `price` with no volume
    pub fn flat(t: DateTime<Utc>, price: Decimal, vwap: Decimal, provider: Provider) -> Self {
        Self {
            t,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
            trade_count: 0,
            vwap: Some(vwap),
            provider,
            is_corrected: false,
        }
    }
}

/// A persisted bar, one per symbol × bucket × timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBar {
    pub symbol: String,
    /// Bucket start (UTC)
    pub t: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub trade_count: u64,
    pub vwap: Option<Decimal>,
    pub timeframe: Timeframe,
    pub session: Session,
    pub is_rth: bool,
    pub adjustment: Adjustment,
    pub provider: Provider,
    pub is_corrected: bool,
    pub bar_id: String,
}

impl CanonicalBar {
    /// Deterministic id for a (symbol, t, timeframe) key
    pub fn make_id(symbol: &str, t: DateTime<Utc>, timeframe: Timeframe) -> String {
        format!("{}-{}-{}", symbol, t.format("%Y-%m-%dT%H:%M:%SZ"), timeframe.label())
    }

    /// Check the OHLC ordering invariant for traded bars
    pub fn is_consistent(&self) -> bool {
        if self.volume == 0 {
            return true;
        }
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

/// Floor a timestamp to a multiple of `step_secs` since the epoch
pub fn floor_to(ts: DateTime<Utc>, step_secs: i64) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(step_secs), 0).unwrap_or(ts)
}
