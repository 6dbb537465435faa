//! Leverage, liquidation price and margin bookkeeping for an entry.
//!
//! Margin for an entry of `size` at leverage `lev` and fee `f`:
//!
//! ```text
//! initial_margin          = size / lev
//! fee_to_open             = size * f
//! possible_bankruptcy_fee = size * (lev - 1) / lev * f
//! cash_used               = initial_margin + fee_to_open + possible_bankruptcy_fee
//! ```
//!
//! The entry is rejected when `cash_used` exceeds the available balance. The
//! remainder of the notional is borrowed.

use log::debug;

use crate::direction::Direction;
use crate::domain::{round_to_step, Candle};
use crate::engine::state::{AccountState, OrderResult};
use crate::orders::{ExitOutcome, OrderStatus, RejectReason};
use crate::settings::{ExchangeSettings, LeverageMode, StaticOrderSettings};
use crate::sizers::{loss_at, EntrySize};

/// Account totals after an accepted entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginUpdate {
    pub leverage: f64,
    pub liq_price: f64,
    pub available_balance: f64,
    pub cash_used: f64,
    pub cash_borrowed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeverageOutcome {
    Applied(MarginUpdate),
    Rejected(RejectReason),
}

pub struct LeverageEngine {
    direction: &'static dyn Direction,
    mode: LeverageMode,
    static_leverage: f64,
    max_equity_risk_pct: f64,
    exchange: ExchangeSettings,
}

impl LeverageEngine {
    pub fn new(
        static_os: &StaticOrderSettings,
        max_equity_risk_pct: f64,
        exchange: &ExchangeSettings,
    ) -> Self {
        Self {
            direction: static_os.long_or_short.direction(),
            mode: static_os.leverage_strategy_type,
            static_leverage: static_os.static_leverage,
            max_equity_risk_pct,
            exchange: *exchange,
        }
    }

    /// Leverage for a position averaged at `average_entry`.
    ///
    /// Dynamic leverage is snapped onto the leverage step and clamped to the
    /// exchange bounds; without a stop loss it falls back to the minimum.
    pub fn leverage(&self, average_entry: f64, sl_price: Option<f64>) -> f64 {
        let ex = &self.exchange;
        match (self.mode, sl_price) {
            (LeverageMode::Static, _) => self.static_leverage,
            (LeverageMode::Dynamic, None) => ex.min_leverage,
            (LeverageMode::Dynamic, Some(sl)) => {
                let raw = self.direction.dynamic_leverage(average_entry, sl, ex.mmr_pct);
                let lev = round_to_step(raw, ex.leverage_tick_step);
                if lev.is_nan() || lev < ex.min_leverage {
                    debug!("leverage {raw} below minimum, using {}", ex.min_leverage);
                    ex.min_leverage
                } else if lev > ex.max_leverage {
                    debug!("leverage {raw} above maximum, using {}", ex.max_leverage);
                    ex.max_leverage
                } else {
                    lev
                }
            }
        }
    }

    pub fn compute(
        &self,
        size: &EntrySize,
        sl_price: Option<f64>,
        account: &AccountState,
    ) -> LeverageOutcome {
        let ex = &self.exchange;
        let leverage = self.leverage(size.average_entry, sl_price);
        let entry = size.entry_size_usd;
        let fee = ex.market_fee_pct;

        let initial_margin = entry / leverage;
        let fee_to_open = entry * fee;
        let possible_bankruptcy_fee = entry * (leverage - 1.0) / leverage * fee;
        let cash_used = initial_margin + fee_to_open + possible_bankruptcy_fee;

        let available = account.available_balance;
        if cash_used > available * leverage || cash_used > available {
            return LeverageOutcome::Rejected(RejectReason::CashUsedExceed);
        }

        let liq_price = self
            .direction
            .liq_price(size.average_entry, leverage, ex.mmr_pct, ex.price_tick_step);

        if self.max_equity_risk_pct > 0.0 {
            let worst = match sl_price {
                Some(sl) => self.direction.adverse(sl, liq_price),
                None => liq_price,
            };
            let loss = loss_at(
                self.direction,
                size.average_entry,
                size.position_size_usd,
                worst,
                fee,
            );
            if loss > account.equity * self.max_equity_risk_pct {
                return LeverageOutcome::Rejected(RejectReason::MaxEquityRisk);
            }
        }

        LeverageOutcome::Applied(MarginUpdate {
            leverage,
            liq_price,
            available_balance: available - cash_used,
            cash_used: account.cash_used + cash_used,
            cash_borrowed: account.cash_borrowed + entry - cash_used,
        })
    }

    /// Liquidation exit if the bar trades through the liquidation price.
    pub fn check_liq_hit(&self, candle: &Candle, order: &OrderResult) -> Option<ExitOutcome> {
        if order.liq_price <= 0.0 || !self.direction.stop_touched(candle, order.liq_price) {
            return None;
        }
        Some(ExitOutcome {
            exit_price: order.liq_price,
            exit_fee_pct: self.exchange.market_fee_pct,
            status: OrderStatus::LiquidationFilled,
        })
    }
}
