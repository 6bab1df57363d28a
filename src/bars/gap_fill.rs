//! Carry-forward gap filling on a dense minute grid

use super::{MinuteBar, Provider};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Fill every empty minute of `[from 00:00, to 23:59]` (UTC) with a flat bar
/// at the last observed close.
///
/// `bars` must be sorted ascending by `t` with one bar per minute. Minutes
/// before the first real observation stay empty. Bars outside the grid are
/// passed through untouched.
pub fn fill_gaps(bars: Vec<MinuteBar>, from: NaiveDate, to: NaiveDate) -> Vec<MinuteBar> {
    let grid_start = from.and_time(NaiveTime::MIN).and_utc();
    let grid_end = to.and_time(NaiveTime::MIN).and_utc() + Duration::minutes(24 * 60 - 1);
    if grid_end < grid_start {
        return bars;
    }

    let grid_len = (grid_end - grid_start).num_minutes() as usize + 1;
    let mut out = Vec::with_capacity(bars.len().max(grid_len));
    let mut input = bars.into_iter().peekable();

    // Carry state may be seeded by bars that precede the grid.
    let mut carried: Option<rust_decimal::Decimal> = None;
    while let Some(bar) = input.next_if(|b| b.t < grid_start) {
        carried = Some(bar.close);
        out.push(bar);
    }

    let mut filled = 0usize;
    let mut minute = grid_start;
    while minute <= grid_end {
        match input.next_if(|b| b.t == minute) {
            Some(bar) => {
                carried = Some(bar.close);
                out.push(bar);
            }
            None => {
                if let Some(price) = carried {
                    out.push(carry_forward(minute, price));
                    filled += 1;
                }
            }
        }
        minute += Duration::minutes(1);
    }

    out.extend(input);

    tracing::debug!(filled, total = out.len(), "Gap fill complete");
    out
}

fn carry_forward(t: DateTime<Utc>, price: rust_decimal::Decimal) -> MinuteBar {
    MinuteBar::flat(t, price, price, Provider::CarryForward)
}
