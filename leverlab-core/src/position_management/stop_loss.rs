//! Stop-loss engine.
//!
//! States per open position: `None -> Initial -> (BreakEven | Trailing) -> Hit`.
//! The lifecycle calls [`StopLossEngine::check_hit`] first each bar, then
//! [`StopLossEngine::check_break_even`] and [`StopLossEngine::check_trailing`]
//! if the position survived.

use crate::direction::Direction;
use crate::domain::{round_dp, round_to_step, Candle, CandleBody};
use crate::engine::state::OrderResult;
use crate::orders::{ExitOutcome, OrderStatus, SlMove};
use crate::position_management::RatchetState;
use crate::settings::{
    BreakEvenTarget, DynamicOrderSettings, ExchangeSettings, StaticOrderSettings, StopLossMode,
};

pub struct StopLossEngine {
    direction: &'static dyn Direction,
    mode: StopLossMode,
    body: CandleBody,
    lookback: usize,
    add_pct: f64,
    be_body: CandleBody,
    be_when_pct: f64,
    be_target: BreakEvenTarget,
    trail_body: CandleBody,
    trail_by_pct: f64,
    trail_when_pct: f64,
    fee_pct: f64,
    price_step: f64,
}

impl StopLossEngine {
    pub fn new(
        static_os: &StaticOrderSettings,
        dynamic: &DynamicOrderSettings,
        exchange: &ExchangeSettings,
    ) -> Self {
        Self {
            direction: static_os.long_or_short.direction(),
            mode: static_os.sl_strategy_type,
            body: dynamic.sl_bcb_type,
            lookback: dynamic.sl_based_on_lookback,
            add_pct: dynamic.sl_based_on_add_pct,
            be_body: dynamic.sl_to_be_cb_type,
            be_when_pct: dynamic.sl_to_be_when_pct,
            be_target: static_os.z_or_e_type,
            trail_body: dynamic.trail_sl_bcb_type,
            trail_by_pct: dynamic.trail_sl_by_pct,
            trail_when_pct: dynamic.trail_sl_when_pct,
            fee_pct: exchange.market_fee_pct,
            price_step: exchange.price_tick_step,
        }
    }

    pub fn break_even_enabled(&self) -> bool {
        self.be_body.is_enabled()
    }

    /// Initial stop for an entry on `bar_index`.
    ///
    /// The most adverse candle-body value over the last `lookback` bars plus
    /// the current one, pushed further out by `add_pct` and truncated onto
    /// the price step. Depends only on the candles and settings.
    pub fn initial(&self, candles: &[Candle], bar_index: usize) -> Option<f64> {
        if self.mode == StopLossMode::Nothing || bar_index >= candles.len() {
            return None;
        }
        let start = bar_index.saturating_sub(self.lookback);
        let extreme = candles[start..=bar_index]
            .iter()
            .map(|c| c.body(self.body))
            .try_fold(None, |acc: Option<f64>, value| {
                let value = value?;
                Some(Some(match acc {
                    Some(prev) => self.direction.adverse(prev, value),
                    None => value,
                }))
            })??;
        let sl = self.direction.offset_adverse(extreme, self.add_pct);
        Some(round_to_step(sl, self.price_step))
    }

    /// Stop-loss exit when the bar touches the stop.
    pub fn check_hit(&self, candle: &Candle, order: &OrderResult) -> Option<ExitOutcome> {
        if !order.has_stop_loss() || !self.direction.stop_touched(candle, order.sl_price) {
            return None;
        }
        Some(ExitOutcome {
            exit_price: order.sl_price,
            exit_fee_pct: self.fee_pct,
            status: OrderStatus::StopLossFilled,
        })
    }

    /// One-shot move of the stop to break-even once the selected candle body
    /// is more than `sl_to_be_when_pct` in profit.
    pub fn check_break_even(
        &self,
        candle: &Candle,
        order: &OrderResult,
        ratchet: &mut RatchetState,
    ) -> Option<SlMove> {
        if !order.can_move_sl_to_be || !order.has_stop_loss() {
            return None;
        }
        if !self.past_threshold(candle, order, self.be_body, self.be_when_pct) {
            return None;
        }
        let avg = order.average_entry;
        let target = match self.be_target {
            BreakEvenTarget::ZeroLoss => {
                round_to_step(self.direction.zero_loss_price(avg, self.fee_pct), self.price_step)
            }
            BreakEvenTarget::AverageEntry => avg,
        };
        ratchet.tighten(target).map(|sl_price| SlMove {
            sl_price,
            status: OrderStatus::MovedSlToBe,
        })
    }

    /// Trails the stop `trail_sl_by_pct` behind the selected candle body once
    /// it is more than `trail_sl_when_pct` in profit. Only ever tightens.
    pub fn check_trailing(
        &self,
        candle: &Candle,
        order: &OrderResult,
        ratchet: &mut RatchetState,
    ) -> Option<SlMove> {
        if !order.has_stop_loss() {
            return None;
        }
        if !self.past_threshold(candle, order, self.trail_body, self.trail_when_pct) {
            return None;
        }
        let body = candle.body(self.trail_body)?;
        let candidate = round_to_step(
            self.direction.offset_adverse(body, self.trail_by_pct),
            self.price_step,
        );
        ratchet.tighten(candidate).map(|sl_price| SlMove {
            sl_price,
            status: OrderStatus::MovedTsl,
        })
    }

    fn past_threshold(
        &self,
        candle: &Candle,
        order: &OrderResult,
        body: CandleBody,
        when_pct: f64,
    ) -> bool {
        let Some(price) = candle.body(body) else {
            return false;
        };
        let pct = round_dp(self.direction.pct_from_entry(price, order.average_entry), 2);
        pct > when_pct
    }
}
