//! Account and open-position state, mutated in place by explicit transitions.

use serde::{Deserialize, Serialize};

use crate::domain::round_dp;
use crate::engine::accounting::Decrease;
use crate::leverage::MarginUpdate;
use crate::orders::{OrderStatus, SlMove};
use crate::position_management::TakeProfit;
use crate::sizers::EntrySize;

/// Account bookkeeping for one settings index.
///
/// At rest between bars `equity == available_balance + cash_used`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub settings_index: usize,
    pub bar_index: usize,
    pub timestamp: i64,
    pub available_balance: f64,
    pub cash_used: f64,
    pub cash_borrowed: f64,
    pub equity: f64,
    /// Cumulative fees paid on closed trades.
    pub fees_paid: f64,
    /// Realized pnl of the most recent close.
    pub realized_pnl: f64,
    /// Entries stacked into the open position.
    pub total_trades: u32,
}

impl AccountState {
    pub fn new(settings_index: usize, starting_equity: f64) -> Self {
        Self {
            settings_index,
            bar_index: 0,
            timestamp: 0,
            available_balance: starting_equity,
            cash_used: 0.0,
            cash_borrowed: 0.0,
            equity: starting_equity,
            fees_paid: 0.0,
            realized_pnl: 0.0,
            total_trades: 0,
        }
    }

    pub fn set_position(&mut self, bar_index: usize, timestamp: i64) {
        self.bar_index = bar_index;
        self.timestamp = timestamp;
    }

    pub fn apply_entry(&mut self, margin: &MarginUpdate, total_trades: u32) {
        self.available_balance = margin.available_balance;
        self.cash_used = margin.cash_used;
        self.cash_borrowed = margin.cash_borrowed;
        self.total_trades = total_trades;
    }

    /// Books a (partial) close. Margin and borrowing are released in
    /// proportion to the share of the position closed.
    pub fn apply_decrease(&mut self, decrease: &Decrease) {
        let fraction = decrease.fraction.clamp(0.0, 1.0);
        let released = self.cash_used * fraction;

        self.equity += decrease.realized_pnl;
        self.available_balance = decrease.realized_pnl + self.available_balance + released;
        self.fees_paid += decrease.fees_paid;
        self.realized_pnl = decrease.realized_pnl;

        if fraction >= 1.0 {
            self.cash_used = 0.0;
            self.cash_borrowed = 0.0;
            self.total_trades = 0;
        } else {
            self.cash_used -= released;
            self.cash_borrowed -= self.cash_borrowed * fraction;
        }
    }

    /// `equity - (available_balance + cash_used)`; zero at rest.
    pub fn accounting_gap(&self) -> f64 {
        self.equity - (self.available_balance + self.cash_used)
    }
}

/// The open position. Empty (all zero) while flat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub average_entry: f64,
    pub entry_price: f64,
    pub entry_size_asset: f64,
    pub entry_size_usd: f64,
    pub position_size_asset: f64,
    pub position_size_usd: f64,
    pub leverage: f64,
    pub liq_price: f64,
    /// Loss at the stop loss, as a positive amount.
    pub possible_loss: f64,
    pub sl_price: f64,
    pub sl_pct: f64,
    pub tp_price: f64,
    pub tp_pct: f64,
    pub exit_price: f64,
    pub can_move_sl_to_be: bool,
    pub order_status: Option<OrderStatus>,
}

impl OrderResult {
    pub fn is_open(&self) -> bool {
        self.position_size_usd > 0.0
    }

    pub fn has_stop_loss(&self) -> bool {
        self.sl_price > 0.0
    }

    pub fn apply_entry(
        &mut self,
        size: &EntrySize,
        margin: &MarginUpdate,
        sl_price: Option<f64>,
        take_profit: Option<TakeProfit>,
        can_move_sl_to_be: bool,
    ) {
        self.average_entry = size.average_entry;
        self.entry_price = size.entry_price;
        self.entry_size_asset = size.entry_size_asset;
        self.entry_size_usd = size.entry_size_usd;
        self.position_size_asset = size.position_size_asset;
        self.position_size_usd = size.position_size_usd;
        self.possible_loss = size.possible_loss;
        self.leverage = margin.leverage;
        self.liq_price = margin.liq_price;
        self.sl_price = sl_price.unwrap_or(0.0);
        self.sl_pct = size.sl_pct;
        match take_profit {
            Some(tp) => {
                self.tp_price = tp.price;
                self.tp_pct = tp.pct;
            }
            None => {
                self.tp_price = 0.0;
                self.tp_pct = 0.0;
            }
        }
        self.exit_price = 0.0;
        self.can_move_sl_to_be = can_move_sl_to_be;
        self.order_status = Some(OrderStatus::EntryFilled);
    }

    /// Shrinks the position by `decrease.fraction`; a full close clears it,
    /// keeping only the exit price and status.
    pub fn apply_decrease(&mut self, decrease: &Decrease, exit_price: f64, status: OrderStatus) {
        if decrease.fraction >= 1.0 {
            *self = OrderResult {
                exit_price,
                order_status: Some(status),
                ..OrderResult::default()
            };
            return;
        }
        let keep = 1.0 - decrease.fraction.max(0.0);
        self.position_size_usd *= keep;
        self.position_size_asset *= keep;
        self.possible_loss *= keep;
        self.exit_price = exit_price;
        self.order_status = Some(status);
    }

    pub fn apply_sl_move(&mut self, sl_move: &SlMove) {
        self.sl_price = sl_move.sl_price;
        if self.average_entry > 0.0 {
            self.sl_pct = round_dp((self.average_entry - sl_move.sl_price).abs() / self.average_entry, 4);
        }
        if sl_move.status == OrderStatus::MovedSlToBe {
            self.can_move_sl_to_be = false;
        }
        self.order_status = Some(sl_move.status);
    }
}
