//! Order lifecycle — per-bar state machine for one settings index.
//!
//! `Flat -> Open -> Flat`. Each bar runs up to three phases:
//!
//! 1. Exits (while Open): liquidation, then stop loss, then take profit. The
//!    first hit closes the whole position.
//! 2. Stop moves (while still Open): break-even, then trailing.
//! 3. Entry: on an entry signal, open a position when Flat (including flat
//!    again this bar) or add to the open one when adds are allowed.
//!
//! Entry and exit rejections are values, not errors: a rejected entry is a
//! no-op for the bar. Only broken invariants and bad inputs are fatal, and
//! only for this settings index.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::direction::Direction;
use crate::domain::{validate_series, Candle};
use crate::engine::accounting;
use crate::engine::state::{AccountState, OrderResult};
use crate::leverage::{LeverageEngine, LeverageOutcome};
use crate::orders::{ExitOutcome, OrderRecord, OrderRecordLog, OrderStatus, RejectReason};
use crate::position_management::{RatchetState, StopLossEngine, TakeProfitEngine};
use crate::settings::{DynamicOrderSettings, ExchangeSettings, SettingsError, StaticOrderSettings};
use crate::signals::SignalSource;
use crate::sizers::{PositionSizer, SizingContext, SizingOutcome};

/// Tolerance for float noise when checking balances.
const BALANCE_EPSILON: f64 = 1e-6;

/// Fatal failure of one settings index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("settings index {settings_index}: invalid settings: {source}")]
    Settings {
        settings_index: usize,
        #[source]
        source: SettingsError,
    },

    #[error("settings index {settings_index}: malformed or out-of-order candle at bar {bar_index}")]
    Candles {
        settings_index: usize,
        bar_index: usize,
    },

    #[error("settings index {settings_index}: signals cover {signals} bars, candles have {candles}")]
    SignalLength {
        settings_index: usize,
        signals: usize,
        candles: usize,
    },

    #[error("settings index {settings_index}, bar {bar_index}: {message}")]
    Invariant {
        settings_index: usize,
        bar_index: usize,
        message: String,
    },
}

impl LifecycleError {
    pub fn settings_index(&self) -> usize {
        match self {
            Self::Settings { settings_index, .. }
            | Self::Candles { settings_index, .. }
            | Self::SignalLength { settings_index, .. }
            | Self::Invariant { settings_index, .. } => *settings_index,
        }
    }

    /// Bar the failure was detected on, if it is tied to one.
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            Self::Candles { bar_index, .. } | Self::Invariant { bar_index, .. } => Some(*bar_index),
            Self::Settings { .. } | Self::SignalLength { .. } => None,
        }
    }
}

/// Everything one lifecycle run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleReport {
    pub settings_index: usize,
    pub records: OrderRecordLog,
    /// Realized pnl of every close, in order.
    pub closed_pnls: Vec<f64>,
    pub starting_equity: f64,
    pub final_equity: f64,
    pub fees_paid: f64,
    /// A position was still open after the last bar.
    pub open_at_end: bool,
    pub rejections: RejectionCounts,
}

impl LifecycleReport {
    pub fn total_trades(&self) -> usize {
        self.closed_pnls.len()
    }

    pub fn total_pnl(&self) -> f64 {
        self.closed_pnls.iter().sum()
    }

    pub fn status_counts(&self) -> BTreeMap<OrderStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.iter() {
            *counts.entry(record.order_status).or_default() += 1;
        }
        counts
    }
}

/// Entry attempts turned into no-ops, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts(BTreeMap<RejectReason, usize>);

impl RejectionCounts {
    pub fn record(&mut self, reason: RejectReason) {
        *self.0.entry(reason).or_default() += 1;
    }

    pub fn get(&self, reason: RejectReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RejectReason, usize)> + '_ {
        self.0.iter().map(|(r, n)| (*r, *n))
    }

    pub fn merge(&mut self, other: &RejectionCounts) {
        for (reason, n) in other.iter() {
            *self.0.entry(reason).or_default() += n;
        }
    }
}

/// State machine for one settings index over one candle series.
pub struct OrderLifecycle {
    direction: &'static dyn Direction,
    exchange: ExchangeSettings,
    static_os: StaticOrderSettings,
    sizer: PositionSizer,
    leverage: LeverageEngine,
    stop_loss: StopLossEngine,
    take_profit: TakeProfitEngine,
    account: AccountState,
    order: OrderResult,
    ratchet: RatchetState,
    log: OrderRecordLog,
    closed_pnls: Vec<f64>,
    rejections: RejectionCounts,
}

impl OrderLifecycle {
    /// Validates the settings and builds the engines for them.
    pub fn new(
        settings_index: usize,
        exchange: &ExchangeSettings,
        static_os: &StaticOrderSettings,
        dynamic: &DynamicOrderSettings,
    ) -> Result<Self, LifecycleError> {
        let invalid = |source| LifecycleError::Settings {
            settings_index,
            source,
        };
        exchange.validate().map_err(invalid)?;
        static_os.validate(exchange).map_err(invalid)?;
        dynamic.validate(static_os).map_err(invalid)?;

        let side = static_os.long_or_short;
        Ok(Self {
            direction: side.direction(),
            exchange: *exchange,
            static_os: *static_os,
            sizer: PositionSizer::new(static_os, dynamic),
            leverage: LeverageEngine::new(static_os, dynamic.max_equity_risk_pct, exchange),
            stop_loss: StopLossEngine::new(static_os, dynamic, exchange),
            take_profit: TakeProfitEngine::new(static_os, dynamic, exchange),
            account: AccountState::new(settings_index, static_os.starting_equity),
            order: OrderResult::default(),
            ratchet: RatchetState::new(side),
            log: OrderRecordLog::new(),
            closed_pnls: Vec::new(),
            rejections: RejectionCounts::default(),
        })
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn order(&self) -> &OrderResult {
        &self.order
    }

    /// Runs every bar in order and returns the report.
    pub fn run(
        mut self,
        candles: &[Candle],
        signals: &dyn SignalSource,
    ) -> Result<LifecycleReport, LifecycleError> {
        let settings_index = self.account.settings_index;
        validate_series(candles).map_err(|bar_index| LifecycleError::Candles {
            settings_index,
            bar_index,
        })?;
        if signals.len() != candles.len() {
            return Err(LifecycleError::SignalLength {
                settings_index,
                signals: signals.len(),
                candles: candles.len(),
            });
        }

        self.log = OrderRecordLog::for_bars(candles.len());
        for bar_index in 0..candles.len() {
            self.step(candles, bar_index, signals)?;
        }

        debug!(
            "settings index {settings_index}: {} records, {} closes, equity {:.2}",
            self.log.len(),
            self.closed_pnls.len(),
            self.account.equity
        );
        Ok(LifecycleReport {
            settings_index,
            open_at_end: self.order.is_open(),
            records: self.log,
            closed_pnls: self.closed_pnls,
            starting_equity: self.static_os.starting_equity,
            final_equity: self.account.equity,
            fees_paid: self.account.fees_paid,
            rejections: self.rejections,
        })
    }

    /// Advances one bar. Bars must be fed in order, each exactly once.
    ///
    /// A `bar_index` past the end of `candles` or `signals` is an error.
    pub fn step(
        &mut self,
        candles: &[Candle],
        bar_index: usize,
        signals: &dyn SignalSource,
    ) -> Result<(), LifecycleError> {
        let settings_index = self.account.settings_index;
        let Some(candle) = candles.get(bar_index) else {
            return Err(LifecycleError::Candles {
                settings_index,
                bar_index,
            });
        };
        if bar_index >= signals.len() {
            return Err(LifecycleError::SignalLength {
                settings_index,
                signals: signals.len(),
                candles: candles.len(),
            });
        }
        self.account.set_position(bar_index, candle.open_time);

        if self.order.is_open() {
            // ─── Phase 1: Exits ───
            let exit = self
                .leverage
                .check_liq_hit(candle, &self.order)
                .or_else(|| self.stop_loss.check_hit(candle, &self.order))
                .or_else(|| {
                    self.take_profit
                        .check_hit(candle, &self.order, signals.exit_price(bar_index))
                });

            if let Some(exit) = exit {
                self.close(exit);
            } else {
                // ─── Phase 2: Stop moves ───
                if let Some(mv) = self
                    .stop_loss
                    .check_break_even(candle, &self.order, &mut self.ratchet)
                {
                    self.order.apply_sl_move(&mv);
                    self.push_record(mv.status);
                }
                if let Some(mv) = self
                    .stop_loss
                    .check_trailing(candle, &self.order, &mut self.ratchet)
                {
                    self.order.apply_sl_move(&mv);
                    self.push_record(mv.status);
                }
            }
        }

        // ─── Phase 3: Entry ───
        if bar_index >= self.static_os.starting_bar
            && signals.entry(bar_index)
            && (!self.order.is_open() || self.static_os.allow_adds)
        {
            self.try_entry(candles, bar_index);
        }

        self.check_invariants(bar_index)
    }

    fn try_entry(&mut self, candles: &[Candle], bar_index: usize) {
        let entry_price = candles[bar_index].close;
        let sl_price = self.stop_loss.initial(candles, bar_index);

        if let Some(sl) = sl_price {
            if !self.direction.stop_is_adverse(entry_price, sl) {
                self.reject(RejectReason::StopLossNotAdverse);
                return;
            }
        }

        let ctx = SizingContext {
            direction: self.direction,
            exchange: &self.exchange,
            equity: self.account.equity,
            entry_price,
            sl_price,
            average_entry: self.order.average_entry,
            position_size_usd: self.order.position_size_usd,
            position_size_asset: self.order.position_size_asset,
            total_trades: self.account.total_trades,
        };
        let size = match self.sizer.size(&ctx) {
            SizingOutcome::Sized(size) => size,
            SizingOutcome::Rejected(reason) => return self.reject(reason),
        };
        if let Some(sl) = sl_price {
            if !self.direction.stop_is_adverse(size.average_entry, sl) {
                return self.reject(RejectReason::StopLossNotAdverse);
            }
        }

        let margin = match self.leverage.compute(&size, sl_price, &self.account) {
            LeverageOutcome::Applied(margin) => margin,
            LeverageOutcome::Rejected(reason) => return self.reject(reason),
        };
        let take_profit = self.take_profit.target(&size);

        self.account.apply_entry(&margin, size.total_trades);
        self.order.apply_entry(
            &size,
            &margin,
            sl_price,
            take_profit,
            self.stop_loss.break_even_enabled(),
        );
        match sl_price {
            Some(sl) => self.ratchet.reset(sl),
            None => self.ratchet.clear(),
        }
        trace!(
            "bar {bar_index}: entry {:.2} usd at {entry_price}, leverage {}",
            size.entry_size_usd,
            margin.leverage
        );
        self.push_record(OrderStatus::EntryFilled);
    }

    fn close(&mut self, exit: ExitOutcome) {
        let decrease = accounting::decrease(
            self.direction,
            self.order.average_entry,
            self.order.position_size_usd,
            self.order.position_size_usd,
            exit.exit_price,
            self.exchange.market_fee_pct,
            exit.exit_fee_pct,
        );
        self.account.apply_decrease(&decrease);
        self.order.apply_decrease(&decrease, exit.exit_price, exit.status);
        if !self.order.is_open() {
            self.ratchet.clear();
        }
        self.closed_pnls.push(decrease.realized_pnl);
        self.push_record(exit.status);
    }

    fn reject(&mut self, reason: RejectReason) {
        self.rejections.record(reason);
        if reason == RejectReason::MaxTrades {
            self.push_record(OrderStatus::HitMaxTrades);
        }
    }

    fn push_record(&mut self, status: OrderStatus) {
        self.log
            .push(OrderRecord::snapshot(&self.account, &self.order, status));
    }

    fn check_invariants(&self, bar_index: usize) -> Result<(), LifecycleError> {
        let acct = &self.account;
        let broken = if !acct.available_balance.is_finite() || !acct.equity.is_finite() {
            Some(format!(
                "non-finite balance (available {}, equity {})",
                acct.available_balance, acct.equity
            ))
        } else if acct.available_balance < -BALANCE_EPSILON {
            Some(format!("negative available balance {}", acct.available_balance))
        } else if acct.accounting_gap().abs() > BALANCE_EPSILON * acct.equity.abs().max(1.0) {
            Some(format!(
                "equity {} != available {} + cash used {}",
                acct.equity, acct.available_balance, acct.cash_used
            ))
        } else {
            None
        };
        match broken {
            Some(message) => Err(LifecycleError::Invariant {
                settings_index: acct.settings_index,
                bar_index,
                message,
            }),
            None => Ok(()),
        }
    }
}

/// Runs one settings combination over a candle series.
pub fn run_single(
    candles: &[Candle],
    signals: &dyn SignalSource,
    exchange: &ExchangeSettings,
    static_os: &StaticOrderSettings,
    dynamic: &DynamicOrderSettings,
) -> Result<LifecycleReport, LifecycleError> {
    OrderLifecycle::new(0, exchange, static_os, dynamic)?.run(candles, signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandleBody;
    use crate::settings::{LeverageMode, SizingMode, TakeProfitMode};
    use crate::signals::SignalSeries;

    fn flat(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64 * 60_000, price, price + 1.0, price - 1.0, price, 0.0))
            .collect()
    }

    fn set(candles: &mut [Candle], i: usize, open: f64, high: f64, low: f64, close: f64) {
        let t = candles[i].open_time;
        candles[i] = Candle::new(t, open, high, low, close, 0.0);
    }

    /// Entry bar whose low (the initial stop) sits under every other bar's low.
    fn dip(candles: &mut [Candle], i: usize) {
        set(candles, i, 100.0, 101.0, 97.0, 100.0);
    }

    #[test]
    fn rejects_invalid_settings_before_running() {
        let st = StaticOrderSettings {
            starting_equity: -1.0,
            ..StaticOrderSettings::default()
        };
        let err = OrderLifecycle::new(
            4,
            &ExchangeSettings::default(),
            &st,
            &DynamicOrderSettings::default(),
        )
        .err();
        assert!(matches!(err, Some(LifecycleError::Settings { settings_index: 4, .. })));
    }

    #[test]
    fn signal_length_mismatch_is_fatal() {
        let candles = flat(5, 100.0);
        let err = run_single(
            &candles,
            &SignalSeries::with_entries_at(4, &[]),
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &DynamicOrderSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err.bar_index(), None);
        assert!(matches!(err, LifecycleError::SignalLength { signals: 4, candles: 5, .. }));
    }

    #[test]
    fn out_of_order_candles_are_fatal() {
        let mut candles = flat(4, 100.0);
        candles[2].open_time = 0;
        let err = run_single(
            &candles,
            &SignalSeries::with_entries_at(4, &[]),
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &DynamicOrderSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err.bar_index(), Some(2));
    }

    #[test]
    fn stepping_past_the_series_is_an_error() {
        let candles = flat(3, 100.0);
        let mut lifecycle = OrderLifecycle::new(
            2,
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &DynamicOrderSettings::default(),
        )
        .unwrap();
        let signals = SignalSeries::with_entries_at(3, &[]);
        lifecycle.step(&candles, 0, &signals).unwrap();

        let err = lifecycle.step(&candles, 3, &signals).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Candles { settings_index: 2, bar_index: 3 }
        ));

        let short = SignalSeries::with_entries_at(1, &[]);
        let err = lifecycle.step(&candles, 1, &short).unwrap_err();
        assert!(matches!(err, LifecycleError::SignalLength { signals: 1, candles: 3, .. }));
    }

    #[test]
    fn take_profit_closes_in_profit() {
        let mut candles = flat(6, 100.0);
        dip(&mut candles, 1);
        set(&mut candles, 3, 100.0, 130.0, 99.5, 125.0);
        let report = run_single(
            &candles,
            &SignalSeries::with_entries_at(6, &[1]),
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &DynamicOrderSettings::default(),
        )
        .unwrap();
        let statuses: Vec<_> = report.records.iter().map(|r| r.order_status).collect();
        assert_eq!(statuses, vec![OrderStatus::EntryFilled, OrderStatus::TakeProfitFilled]);
        assert!(report.final_equity > report.starting_equity);
        assert!(!report.open_at_end);
    }

    #[test]
    fn max_trades_records_a_row() {
        let mut candles = flat(5, 100.0);
        dip(&mut candles, 1);
        let report = run_single(
            &candles,
            &SignalSeries::with_entries_at(5, &[1, 2]),
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &DynamicOrderSettings::default(),
        )
        .unwrap();
        assert_eq!(report.records.count(OrderStatus::EntryFilled), 1);
        assert_eq!(report.records.count(OrderStatus::HitMaxTrades), 1);
        assert_eq!(report.rejections.get(RejectReason::MaxTrades), 1);
        assert!(report.open_at_end);
    }

    #[test]
    fn adds_stack_into_one_position() {
        let mut candles = flat(6, 100.0);
        set(&mut candles, 2, 100.0, 104.0, 101.5, 103.0);
        let st = StaticOrderSettings {
            increase_position_type: SizingMode::Amount,
            leverage_strategy_type: LeverageMode::Static,
            static_leverage: 2.0,
            tp_strategy_type: TakeProfitMode::Nothing,
            size_amount: 100.0,
            ..StaticOrderSettings::default()
        };
        let dynamic = DynamicOrderSettings {
            max_trades: 3,
            sl_based_on_add_pct: 0.05,
            ..DynamicOrderSettings::default()
        };
        let report = run_single(
            &candles,
            &SignalSeries::with_entries_at(6, &[1, 2]),
            &ExchangeSettings::default(),
            &st,
            &dynamic,
        )
        .unwrap();
        let entries: Vec<_> = report
            .records
            .iter()
            .filter(|r| r.order_status == OrderStatus::EntryFilled)
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].total_trades, 2);
        assert_eq!(entries[1].position_size_usd, 200.0);
        assert!(entries[1].average_entry > 100.0 && entries[1].average_entry < 103.0);
    }

    #[test]
    fn no_adds_when_disabled() {
        let mut candles = flat(5, 100.0);
        dip(&mut candles, 1);
        let st = StaticOrderSettings {
            allow_adds: false,
            ..StaticOrderSettings::default()
        };
        let dynamic = DynamicOrderSettings {
            max_trades: 5,
            ..DynamicOrderSettings::default()
        };
        let report = run_single(
            &candles,
            &SignalSeries::with_entries_at(5, &[1, 2, 3]),
            &ExchangeSettings::default(),
            &st,
            &dynamic,
        )
        .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.rejections.total(), 0);
    }

    #[test]
    fn stop_above_entry_is_rejected_for_longs() {
        let candles = flat(3, 100.0);
        let dynamic = DynamicOrderSettings {
            sl_bcb_type: CandleBody::High,
            ..DynamicOrderSettings::default()
        };
        let report = run_single(
            &candles,
            &SignalSeries::with_entries_at(3, &[1]),
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &dynamic,
        )
        .unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.rejections.get(RejectReason::StopLossNotAdverse), 1);
    }

    #[test]
    fn entries_wait_for_starting_bar() {
        let mut candles = flat(5, 100.0);
        dip(&mut candles, 3);
        let st = StaticOrderSettings {
            starting_bar: 3,
            ..StaticOrderSettings::default()
        };
        let report = run_single(
            &candles,
            &SignalSeries::with_entries_at(5, &[1, 3]),
            &ExchangeSettings::default(),
            &st,
            &DynamicOrderSettings::default(),
        )
        .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records.records()[0].bar_index, 3);
    }
}
