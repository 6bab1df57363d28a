//! Trade/quote reconciliation into one canonical minute series
//!
//! Outer join on the minute key. A minute with trade volume takes its prices
//! from trades; otherwise a quote mid produces a flat bar; a minute with
//! neither is left out.

use super::aggregate::{MinuteTable, QuoteMinute, TradeMinute};
use super::{MinuteBar, Provider};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Consolidates per-file minute tables and reconciles the two streams
#[derive(Debug, Default)]
pub struct Reconciler {
    trades: MinuteTable<TradeMinute>,
    quotes: MinuteTable<QuoteMinute>,
}

/// Provider distribution of a reconciled series
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub from_trades: usize,
    pub from_quotes: usize,
    /// Minutes with trade rows but no volume and no quote
    pub dropped: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one file's trade minutes into the consolidated series
    pub fn add_trades(&mut self, table: MinuteTable<TradeMinute>) {
        self.trades.merge(table);
    }

    /// Fold one file's quote minutes into the consolidated series
    pub fn add_quotes(&mut self, table: MinuteTable<QuoteMinute>) {
        self.quotes.merge(table);
    }

    pub fn trade_minutes(&self) -> usize {
        self.trades.len()
    }

    pub fn quote_minutes(&self) -> usize {
        self.quotes.len()
    }

    /// Produce the canonical minute series, ascending by minute
    pub fn reconcile(&self) -> (Vec<MinuteBar>, ReconcileStats) {
        let minutes: BTreeSet<DateTime<Utc>> = self
            .trades
            .minutes()
            .chain(self.quotes.minutes())
            .copied()
            .collect();

        let mut stats = ReconcileStats::default();
        let mut bars = Vec::with_capacity(minutes.len());

        for minute in minutes {
            let trade = self.trades.get(&minute).filter(|t| t.volume > 0);
            let quote = self.quotes.get(&minute);

            match (trade, quote) {
                (Some(trade), _) => {
                    stats.from_trades += 1;
                    bars.push(MinuteBar {
                        t: minute,
                        open: trade.open,
                        high: trade.high,
                        low: trade.low,
                        close: trade.close,
                        volume: trade.volume,
                        trade_count: trade.trade_count,
                        vwap: trade.vwap(),
                        provider: Provider::Trades,
                        is_corrected: false,
                    });
                }
                (None, Some(quote)) => {
                    stats.from_quotes += 1;
                    bars.push(MinuteBar::flat(
                        minute,
                        quote.mid_first,
                        quote.mid_mean(),
                        Provider::TbboFill,
                    ));
                }
                (None, None) => stats.dropped += 1,
            }
        }

        (bars, stats)
    }
}
