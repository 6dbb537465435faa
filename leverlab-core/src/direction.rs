//! Trade direction.
//!
//! Every price formula that differs between longs and shorts lives behind the
//! [`Direction`] trait. The implementation is chosen once from a [`Side`] when
//! an engine is built; nothing re-dispatches on the side inside the bar loop.

use serde::{Deserialize, Serialize};

use crate::domain::{round_to_step, round_up_to_step, Candle};

/// Safety pad between the stop loss and the solved liquidation price.
pub const LIQ_PAD_PCT: f64 = 0.001;

/// Position side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[default]
    Long,
    Short,
}

impl Side {
    /// The direction implementation for this side.
    pub fn direction(self) -> &'static dyn Direction {
        match self {
            Side::Long => &Long,
            Side::Short => &Short,
        }
    }
}

/// Side-specific price math.
///
/// "Adverse" means the direction in which the position loses money: down for
/// a long, up for a short.
pub trait Direction: Send + Sync {
    fn side(&self) -> Side;

    /// Entry size in quote currency that loses `loss` (positive) at `sl_price`,
    /// net of entry and exit fees, when opening a fresh position.
    fn entry_size_flat(&self, entry_price: f64, sl_price: f64, loss: f64, fee_pct: f64) -> f64;

    /// Entry size in quote currency that brings the total loss of the combined
    /// position at `sl_price` to `loss` (positive), given the existing average
    /// entry and position size.
    fn entry_size_adding(
        &self,
        average_entry: f64,
        position_size_usd: f64,
        entry_price: f64,
        sl_price: f64,
        loss: f64,
        fee_pct: f64,
    ) -> f64;

    /// Leverage that puts the liquidation price just past the padded stop loss.
    fn dynamic_leverage(&self, average_entry: f64, sl_price: f64, mmr_pct: f64) -> f64;

    /// Liquidation price, rounded away from the position onto the price step.
    fn liq_price(&self, average_entry: f64, leverage: f64, mmr_pct: f64, price_step: f64) -> f64;

    /// Gross pnl of `coin_size` units opened at `average_entry` and closed at `exit_price`.
    fn pnl(&self, coin_size: f64, average_entry: f64, exit_price: f64) -> f64;

    /// The more adverse of two prices.
    fn adverse(&self, a: f64, b: f64) -> f64;

    /// Move `price` adversely by `pct` of itself.
    fn offset_adverse(&self, price: f64, pct: f64) -> f64;

    /// Favorable distance of `price` from `average_entry` as a fraction of the entry.
    fn pct_from_entry(&self, price: f64, average_entry: f64) -> f64;

    /// Stop price at which closing the position loses nothing after fees.
    fn zero_loss_price(&self, average_entry: f64, fee_pct: f64) -> f64;

    /// True when `candidate` is strictly tighter than `current`.
    fn is_tighter(&self, candidate: f64, current: f64) -> bool;

    /// True when the bar trades at or through a stop-type level.
    fn stop_touched(&self, candle: &Candle, level: f64) -> bool;

    /// True when the bar trades strictly through a profit target.
    fn target_crossed(&self, candle: &Candle, target: f64) -> bool;

    /// Target price that nets `profit` on `position_size_usd` after the entry
    /// fee and the take-profit exit fee.
    fn take_profit_price(
        &self,
        average_entry: f64,
        position_size_usd: f64,
        profit: f64,
        entry_fee_pct: f64,
        exit_fee_pct: f64,
    ) -> f64;

    /// True when `sl_price` sits on the adverse side of `entry_price`.
    fn stop_is_adverse(&self, entry_price: f64, sl_price: f64) -> bool {
        self.adverse(entry_price, sl_price) == sl_price && sl_price != entry_price
    }
}

/// Long direction: profits when price rises.
#[derive(Debug, Clone, Copy, Default)]
pub struct Long;

/// Short direction: profits when price falls.
#[derive(Debug, Clone, Copy, Default)]
pub struct Short;

impl Direction for Long {
    fn side(&self) -> Side {
        Side::Long
    }

    fn entry_size_flat(&self, entry_price: f64, sl_price: f64, loss: f64, fee_pct: f64) -> f64 {
        let div_by = -sl_price + entry_price + entry_price * fee_pct + fee_pct * sl_price;
        entry_price * loss / div_by
    }

    fn entry_size_adding(
        &self,
        average_entry: f64,
        position_size_usd: f64,
        entry_price: f64,
        sl_price: f64,
        loss: f64,
        fee_pct: f64,
    ) -> f64 {
        let (a, p, e, n, m) = (average_entry, position_size_usd, entry_price, sl_price, fee_pct);
        let f = -loss;
        -((e * a * f - e * n * p + e * n * m * p + e * a * p + e * m * a * p)
            / (a * (-n + e + n * m + e * m)))
    }

    fn dynamic_leverage(&self, average_entry: f64, sl_price: f64, mmr_pct: f64) -> f64 {
        let padded = sl_price - sl_price * LIQ_PAD_PCT;
        -average_entry / (padded - average_entry - mmr_pct * average_entry)
    }

    fn liq_price(&self, average_entry: f64, leverage: f64, mmr_pct: f64, price_step: f64) -> f64 {
        round_to_step(average_entry * (1.0 - 1.0 / leverage + mmr_pct), price_step)
    }

    fn pnl(&self, coin_size: f64, average_entry: f64, exit_price: f64) -> f64 {
        coin_size * (exit_price - average_entry)
    }

    fn adverse(&self, a: f64, b: f64) -> f64 {
        a.min(b)
    }

    fn offset_adverse(&self, price: f64, pct: f64) -> f64 {
        price - price * pct
    }

    fn pct_from_entry(&self, price: f64, average_entry: f64) -> f64 {
        (price - average_entry) / average_entry
    }

    fn zero_loss_price(&self, average_entry: f64, fee_pct: f64) -> f64 {
        (fee_pct * average_entry + average_entry) / (1.0 - fee_pct)
    }

    fn is_tighter(&self, candidate: f64, current: f64) -> bool {
        candidate > current
    }

    fn stop_touched(&self, candle: &Candle, level: f64) -> bool {
        candle.low <= level
    }

    fn target_crossed(&self, candle: &Candle, target: f64) -> bool {
        candle.high > target
    }

    fn take_profit_price(
        &self,
        average_entry: f64,
        position_size_usd: f64,
        profit: f64,
        entry_fee_pct: f64,
        exit_fee_pct: f64,
    ) -> f64 {
        (profit * average_entry
            + average_entry * position_size_usd
            + average_entry * entry_fee_pct * position_size_usd)
            / (position_size_usd * (1.0 - exit_fee_pct))
    }
}

impl Direction for Short {
    fn side(&self) -> Side {
        Side::Short
    }

    fn entry_size_flat(&self, entry_price: f64, sl_price: f64, loss: f64, fee_pct: f64) -> f64 {
        let div_by = -entry_price + sl_price + entry_price * fee_pct + fee_pct * sl_price;
        entry_price * loss / div_by
    }

    fn entry_size_adding(
        &self,
        average_entry: f64,
        position_size_usd: f64,
        entry_price: f64,
        sl_price: f64,
        loss: f64,
        fee_pct: f64,
    ) -> f64 {
        let (a, p, e, n, m) = (average_entry, position_size_usd, entry_price, sl_price, fee_pct);
        let f = -loss;
        -((e * a * f - e * a * p + e * n * p + e * n * m * p + e * m * a * p)
            / (a * (n - e + n * m + e * m)))
    }

    fn dynamic_leverage(&self, average_entry: f64, sl_price: f64, mmr_pct: f64) -> f64 {
        let padded = sl_price + sl_price * LIQ_PAD_PCT;
        average_entry / (padded - average_entry + mmr_pct * average_entry)
    }

    fn liq_price(&self, average_entry: f64, leverage: f64, mmr_pct: f64, price_step: f64) -> f64 {
        round_up_to_step(average_entry * (1.0 + 1.0 / leverage - mmr_pct), price_step)
    }

    fn pnl(&self, coin_size: f64, average_entry: f64, exit_price: f64) -> f64 {
        coin_size * (average_entry - exit_price)
    }

    fn adverse(&self, a: f64, b: f64) -> f64 {
        a.max(b)
    }

    fn offset_adverse(&self, price: f64, pct: f64) -> f64 {
        price + price * pct
    }

    fn pct_from_entry(&self, price: f64, average_entry: f64) -> f64 {
        (average_entry - price) / average_entry
    }

    fn zero_loss_price(&self, average_entry: f64, fee_pct: f64) -> f64 {
        (average_entry - fee_pct * average_entry) / (1.0 + fee_pct)
    }

    fn is_tighter(&self, candidate: f64, current: f64) -> bool {
        candidate < current
    }

    fn stop_touched(&self, candle: &Candle, level: f64) -> bool {
        candle.high >= level
    }

    fn target_crossed(&self, candle: &Candle, target: f64) -> bool {
        candle.low < target
    }

    fn take_profit_price(
        &self,
        average_entry: f64,
        position_size_usd: f64,
        profit: f64,
        entry_fee_pct: f64,
        exit_fee_pct: f64,
    ) -> f64 {
        average_entry
            * (position_size_usd - position_size_usd * entry_fee_pct - profit)
            / (position_size_usd * (1.0 + exit_fee_pct))
    }
}
