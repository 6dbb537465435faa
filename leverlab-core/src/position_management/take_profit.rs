//! Take-profit engine: risk:reward targets or caller-provided exits.

use crate::direction::Direction;
use crate::domain::{round_dp, round_to_step, Candle};
use crate::engine::state::OrderResult;
use crate::orders::{ExitOutcome, OrderStatus};
use crate::settings::{DynamicOrderSettings, ExchangeSettings, StaticOrderSettings, TakeProfitMode};
use crate::sizers::EntrySize;

/// A take-profit target and its distance from the average entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeProfit {
    pub price: f64,
    pub pct: f64,
}

pub struct TakeProfitEngine {
    direction: &'static dyn Direction,
    mode: TakeProfitMode,
    risk_reward: f64,
    entry_fee_pct: f64,
    exit_fee_pct: f64,
    price_step: f64,
}

impl TakeProfitEngine {
    pub fn new(
        static_os: &StaticOrderSettings,
        dynamic: &DynamicOrderSettings,
        exchange: &ExchangeSettings,
    ) -> Self {
        Self {
            direction: static_os.long_or_short.direction(),
            mode: static_os.tp_strategy_type,
            risk_reward: dynamic.risk_reward,
            entry_fee_pct: exchange.market_fee_pct,
            exit_fee_pct: static_os.tp_fee_pct(exchange),
            price_step: exchange.price_tick_step,
        }
    }

    pub fn exit_fee_pct(&self) -> f64 {
        self.exit_fee_pct
    }

    /// Target for the combined position after an entry.
    ///
    /// Risk:reward solves for the price at which closing the whole position
    /// nets `risk_reward * possible_loss` after the entry and exit fees.
    pub fn target(&self, size: &EntrySize) -> Option<TakeProfit> {
        if self.mode != TakeProfitMode::RiskReward {
            return None;
        }
        let avg = size.average_entry;
        let profit = self.risk_reward * size.possible_loss;
        let raw = self.direction.take_profit_price(
            avg,
            size.position_size_usd,
            profit,
            self.entry_fee_pct,
            self.exit_fee_pct,
        );
        let price = round_to_step(raw, self.price_step);
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some(TakeProfit {
            price,
            pct: round_dp((price - avg).abs() / avg, 4),
        })
    }

    /// Take-profit exit for this bar.
    ///
    /// Risk:reward fills when the bar trades strictly through the target.
    /// Provided mode fills at the exit price supplied for the bar, if any.
    pub fn check_hit(
        &self,
        candle: &Candle,
        order: &OrderResult,
        provided_exit: Option<f64>,
    ) -> Option<ExitOutcome> {
        let exit_price = match self.mode {
            TakeProfitMode::Nothing => return None,
            TakeProfitMode::RiskReward => {
                if order.tp_price <= 0.0 || !self.direction.target_crossed(candle, order.tp_price) {
                    return None;
                }
                order.tp_price
            }
            TakeProfitMode::Provided => provided_exit.filter(|p| p.is_finite() && *p > 0.0)?,
        };
        Some(ExitOutcome {
            exit_price,
            exit_fee_pct: self.exit_fee_pct,
            status: OrderStatus::TakeProfitFilled,
        })
    }
}
