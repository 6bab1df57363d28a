//! Bar derivation stages
//!
//! Tick files are reduced to per-minute partials, reconciled into one canonical
//! minute series, optionally gap-filled, session-labeled, and finally resampled
//! to the requested timeframe.

mod aggregate;
mod gap_fill;
mod reconcile;
mod resample;
mod session;
mod types;

pub use aggregate::{
    aggregate_quote_file, aggregate_trade_file, MinutePartial, MinuteTable, QuoteMinute,
    TradeMinute,
};
pub use gap_fill::fill_gaps;
pub use reconcile::{ReconcileStats, Reconciler};
pub use resample::resample;
pub use session::{classify, SessionLabeler};
pub use types::{
    floor_to, Adjustment, CanonicalBar, MinuteBar, Provider, Session, Timeframe,
};
