//! Close accounting: realized pnl and fees for reducing a position.

use crate::direction::Direction;

/// Result of closing part or all of a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decrease {
    pub realized_pnl: f64,
    pub fees_paid: f64,
    /// Share of the position closed, in (0, 1].
    pub fraction: f64,
}

/// Realized pnl of closing `close_size_usd` of a `position_size_usd` position.
///
/// `coin_size = close_size/average_entry`; the entry fee is charged on the
/// entry notional and the exit fee on the exit notional.
pub fn decrease(
    direction: &dyn Direction,
    average_entry: f64,
    position_size_usd: f64,
    close_size_usd: f64,
    exit_price: f64,
    entry_fee_pct: f64,
    exit_fee_pct: f64,
) -> Decrease {
    let close_size_usd = close_size_usd.min(position_size_usd);
    let coin_size = close_size_usd / average_entry;
    let pnl = direction.pnl(coin_size, average_entry, exit_price);
    let fee_open = coin_size * average_entry * entry_fee_pct;
    let fee_close = coin_size * exit_price * exit_fee_pct;
    let fees_paid = fee_open + fee_close;
    let fraction = if position_size_usd > 0.0 {
        close_size_usd / position_size_usd
    } else {
        0.0
    };
    Decrease {
        realized_pnl: pnl - fees_paid,
        fees_paid,
        fraction,
    }
}
