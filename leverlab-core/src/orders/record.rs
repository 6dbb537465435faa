//! Order record log — one fixed-schema row per state-changing event.

use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::engine::state::{AccountState, OrderResult};

/// One log row. A snapshot of the account and position right after an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub settings_index: usize,
    pub bar_index: usize,
    pub timestamp: i64,
    pub order_status: OrderStatus,
    pub equity: f64,
    pub available_balance: f64,
    pub cash_borrowed: f64,
    pub cash_used: f64,
    pub fees_paid: f64,
    pub realized_pnl: f64,
    pub total_trades: u32,
    pub average_entry: f64,
    pub entry_price: f64,
    pub entry_size_usd: f64,
    pub exit_price: f64,
    pub position_size_usd: f64,
    pub leverage: f64,
    pub liq_price: f64,
    pub possible_loss: f64,
    pub sl_pct: f64,
    pub sl_price: f64,
    pub tp_pct: f64,
    pub tp_price: f64,
}

impl OrderRecord {
    pub fn snapshot(account: &AccountState, order: &OrderResult, status: OrderStatus) -> Self {
        Self {
            settings_index: account.settings_index,
            bar_index: account.bar_index,
            timestamp: account.timestamp,
            order_status: status,
            equity: account.equity,
            available_balance: account.available_balance,
            cash_borrowed: account.cash_borrowed,
            cash_used: account.cash_used,
            fees_paid: account.fees_paid,
            realized_pnl: account.realized_pnl,
            total_trades: account.total_trades,
            average_entry: order.average_entry,
            entry_price: order.entry_price,
            entry_size_usd: order.entry_size_usd,
            exit_price: order.exit_price,
            position_size_usd: order.position_size_usd,
            leverage: order.leverage,
            liq_price: order.liq_price,
            possible_loss: order.possible_loss,
            sl_pct: order.sl_pct,
            sl_price: order.sl_price,
            tp_pct: order.tp_pct,
            tp_price: order.tp_price,
        }
    }
}

/// Append-only event log.
///
/// Pre-sized from the bar count (events are rarer than bars) and grown on
/// demand; rows are never dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderRecordLog {
    records: Vec<OrderRecord>,
}

impl OrderRecordLog {
    /// Minimum pre-sized capacity.
    pub const MIN_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Log pre-sized for a series of `bars` candles.
    pub fn for_bars(bars: usize) -> Self {
        Self {
            records: Vec::with_capacity((bars / 3).max(Self::MIN_CAPACITY)),
        }
    }

    pub fn push(&mut self, record: OrderRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Number of rows with the given status.
    pub fn count(&self, status: OrderStatus) -> usize {
        self.records
            .iter()
            .filter(|r| r.order_status == status)
            .count()
    }

    /// Rows that closed a position.
    pub fn exits(&self) -> impl Iterator<Item = &OrderRecord> {
        self.records.iter().filter(|r| r.order_status.is_exit())
    }
}
