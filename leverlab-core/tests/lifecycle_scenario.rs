//! End-to-end lifecycle scenarios with hand-checkable numbers.

use leverlab_core::direction::Side;
use leverlab_core::domain::{Candle, CandleBody};
use leverlab_core::engine::run_single;
use leverlab_core::orders::{OrderStatus, RejectReason};
use leverlab_core::settings::{
    DynamicOrderSettings, ExchangeSettings, LeverageMode, SizingMode, StaticOrderSettings,
    TakeProfitMode,
};
use leverlab_core::signals::SignalSeries;

const FEE: f64 = 0.0006;
const MMR: f64 = 0.005;
const LIMIT_FEE: f64 = 0.0002;

// ── Helpers ──────────────────────────────────────────────────────────

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(1_600_000_000_000 + i as i64 * 3_600_000, open, high, low, close, 10.0)
}

/// Ten bars around 100. Bar 2 dips to 95 (the long stop); bar 5 trades
/// through it without reaching the liquidation price.
fn long_series() -> Vec<Candle> {
    (0..10)
        .map(|i| match i {
            2 => bar(i, 100.0, 101.0, 95.0, 100.0),
            5 => bar(i, 99.0, 99.5, 94.95, 95.2),
            6.. => bar(i, 95.2, 96.0, 94.9, 95.5),
            _ => bar(i, 100.0, 101.0, 99.0, 100.0),
        })
        .collect()
}

fn short_series() -> Vec<Candle> {
    (0..10)
        .map(|i| match i {
            2 => bar(i, 100.0, 105.0, 99.0, 100.0),
            5 => bar(i, 101.0, 105.05, 100.5, 104.8),
            6.. => bar(i, 104.8, 105.1, 104.0, 104.5),
            _ => bar(i, 100.0, 101.0, 99.0, 100.0),
        })
        .collect()
}

/// Leverage the dynamic engine should pick, recomputed from the formula.
fn expected_long_leverage(avg: f64, sl: f64) -> f64 {
    let padded = sl - sl * 0.001;
    let raw = avg / (avg + MMR * avg - padded);
    (raw / 0.01).trunc() * 0.01
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn ten_bar_long_stop_loss() {
    let candles = long_series();
    let signals = SignalSeries::with_entries_at(candles.len(), &[2]);
    let report = run_single(
        &candles,
        &signals,
        &ExchangeSettings::default(),
        &StaticOrderSettings::default(),
        &DynamicOrderSettings::default(),
    )
    .unwrap();

    let statuses: Vec<_> = report.records.iter().map(|r| r.order_status).collect();
    assert_eq!(statuses, vec![OrderStatus::EntryFilled, OrderStatus::StopLossFilled]);

    let entry = report.records.records()[0];
    let exit = report.records.records()[1];
    assert_eq!(entry.bar_index, 2);
    assert_eq!(exit.bar_index, 5);
    assert_eq!(entry.sl_price, 95.0);
    assert_eq!(exit.exit_price, 95.0);

    // Closed-form close of the whole position at the stop.
    let coin = entry.position_size_usd / entry.average_entry;
    let pnl = coin * (95.0 - entry.average_entry);
    let fees = coin * entry.average_entry * FEE + coin * 95.0 * FEE;
    let expected = 1000.0 + pnl - fees;
    assert!((report.final_equity - expected).abs() < 1e-9);
    assert!((exit.equity - expected).abs() < 1e-9);
    assert!((exit.available_balance - expected).abs() < 1e-9);
    assert_eq!(exit.cash_used, 0.0);
    assert_eq!(report.closed_pnls.len(), 1);
    assert!((report.fees_paid - fees).abs() < 1e-12);
}

#[test]
fn risk_sizing_and_dynamic_leverage_scenario() {
    let candles = long_series();
    let signals = SignalSeries::with_entries_at(candles.len(), &[2]);
    let report = run_single(
        &candles,
        &signals,
        &ExchangeSettings::default(),
        &StaticOrderSettings::default(),
        &DynamicOrderSettings::default(),
    )
    .unwrap();
    let entry = report.records.records()[0];

    // 1% of 1000 risked between 100 and 95 with fees on both sides.
    let raw = 100.0 * 10.0 / (100.0 - 95.0 + 100.0 * FEE + 95.0 * FEE);
    assert_eq!(entry.entry_size_usd, (raw * 100.0).round() / 100.0);
    assert_eq!(entry.entry_size_usd, 195.43);

    let lev = expected_long_leverage(100.0, 95.0);
    assert!((entry.leverage - lev).abs() < 1e-9);
    let liq = 100.0 * (1.0 - 1.0 / entry.leverage + MMR);
    assert!(entry.liq_price <= liq && entry.liq_price > liq - 0.01);
    assert!(entry.liq_price < entry.sl_price);

    let size = entry.entry_size_usd;
    let lev = entry.leverage;
    let cash_used = size / lev + size * FEE + size * (lev - 1.0) / lev * FEE;
    assert!((entry.cash_used - cash_used).abs() < 1e-9);
    assert!((entry.available_balance - (1000.0 - cash_used)).abs() < 1e-9);
    assert!((entry.cash_borrowed - (size - cash_used)).abs() < 1e-9);
}

#[test]
fn ten_bar_short_stop_loss() {
    let candles = short_series();
    let signals = SignalSeries::with_entries_at(candles.len(), &[2]);
    let st = StaticOrderSettings {
        long_or_short: Side::Short,
        ..StaticOrderSettings::default()
    };
    let dynamic = DynamicOrderSettings {
        sl_bcb_type: CandleBody::High,
        ..DynamicOrderSettings::default()
    };
    let report = run_single(&candles, &signals, &ExchangeSettings::default(), &st, &dynamic).unwrap();

    let statuses: Vec<_> = report.records.iter().map(|r| r.order_status).collect();
    assert_eq!(statuses, vec![OrderStatus::EntryFilled, OrderStatus::StopLossFilled]);
    let entry = report.records.records()[0];
    assert_eq!(entry.sl_price, 105.0);
    assert!(entry.liq_price > entry.sl_price);

    let coin = entry.position_size_usd / entry.average_entry;
    let pnl = coin * (entry.average_entry - 105.0);
    let fees = coin * entry.average_entry * FEE + coin * 105.0 * FEE;
    assert!((report.final_equity - (1000.0 + pnl - fees)).abs() < 1e-9);
}

#[test]
fn liquidation_preempts_stop_loss() {
    let candles = long_series();
    let signals = SignalSeries::with_entries_at(candles.len(), &[2]);
    let st = StaticOrderSettings {
        leverage_strategy_type: LeverageMode::Static,
        static_leverage: 50.0,
        tp_strategy_type: TakeProfitMode::Nothing,
        ..StaticOrderSettings::default()
    };
    let report = run_single(
        &candles,
        &signals,
        &ExchangeSettings::default(),
        &st,
        &DynamicOrderSettings::default(),
    )
    .unwrap();

    // 100 * (1 - 1/50 + 0.005) = 98.5 sits above the 95 stop; bar 5 trades
    // through both and the liquidation fills first
    let exit = report.records.records()[1];
    assert_eq!(exit.order_status, OrderStatus::LiquidationFilled);
    assert_eq!(exit.bar_index, 5);
    assert_eq!(exit.exit_price, 98.5);
    assert!(exit.available_balance >= 0.0);
    assert!(report.final_equity < 1000.0);
}

#[test]
fn break_even_then_trailing_then_stop() {
    let candles = vec![
        bar(0, 100.0, 101.0, 99.0, 100.0),
        bar(1, 100.0, 101.0, 95.0, 100.0),
        bar(2, 100.0, 104.0, 100.0, 103.5),
        bar(3, 103.5, 108.0, 103.0, 107.0),
        bar(4, 107.0, 107.5, 103.0, 104.0),
    ];
    let signals = SignalSeries::with_entries_at(candles.len(), &[1]);
    let st = StaticOrderSettings {
        tp_strategy_type: TakeProfitMode::Nothing,
        ..StaticOrderSettings::default()
    };
    let dynamic = DynamicOrderSettings {
        sl_to_be_cb_type: CandleBody::Close,
        sl_to_be_when_pct: 0.02,
        trail_sl_bcb_type: CandleBody::Close,
        trail_sl_when_pct: 0.05,
        trail_sl_by_pct: 0.02,
        ..DynamicOrderSettings::default()
    };
    let report = run_single(&candles, &signals, &ExchangeSettings::default(), &st, &dynamic).unwrap();

    let moves: Vec<_> = report
        .records
        .iter()
        .map(|r| (r.bar_index, r.order_status, r.sl_price))
        .collect();
    assert_eq!(
        moves,
        vec![
            (1, OrderStatus::EntryFilled, 95.0),
            (2, OrderStatus::MovedSlToBe, 100.12),
            (3, OrderStatus::MovedTsl, 104.86),
            (4, OrderStatus::StopLossFilled, 0.0),
        ]
    );
    let exit = report.records.records()[3];
    assert_eq!(exit.exit_price, 104.86);
    assert!(report.closed_pnls[0] > 0.0);
}

#[test]
fn max_equity_risk_rejects_the_entry() {
    let candles = long_series();
    let signals = SignalSeries::with_entries_at(candles.len(), &[2]);
    let run = |max_equity_risk_pct| {
        let dynamic = DynamicOrderSettings {
            max_equity_risk_pct,
            ..DynamicOrderSettings::default()
        };
        run_single(
            &candles,
            &signals,
            &ExchangeSettings::default(),
            &StaticOrderSettings::default(),
            &dynamic,
        )
        .unwrap()
    };

    // Closing 195.43 usd at the ~94.9 liquidation price loses about 10 after
    // fees, double the 0.5% allowance
    let report = run(0.005);
    assert!(report.records.is_empty());
    assert_eq!(report.rejections.get(RejectReason::MaxEquityRisk), 1);
    assert_eq!(report.rejections.total(), 1);
    assert_eq!(report.final_equity, 1000.0);

    let report = run(0.02);
    assert_eq!(report.rejections.total(), 0);
    assert_eq!(report.records.count(OrderStatus::EntryFilled), 1);
}

#[test]
fn provided_exit_price_fills_the_take_profit() {
    let candles = long_series();
    let mut entries = vec![false; candles.len()];
    entries[2] = true;
    let mut exits = vec![None; candles.len()];
    // Before the entry: ignored while flat
    exits[1] = Some(90.0);
    exits[4] = Some(102.0);
    let signals = SignalSeries::new(entries, exits).unwrap();
    let st = StaticOrderSettings {
        tp_strategy_type: TakeProfitMode::Provided,
        ..StaticOrderSettings::default()
    };
    let report = run_single(
        &candles,
        &signals,
        &ExchangeSettings::default(),
        &st,
        &DynamicOrderSettings::default(),
    )
    .unwrap();

    let statuses: Vec<_> = report.records.iter().map(|r| r.order_status).collect();
    assert_eq!(statuses, vec![OrderStatus::EntryFilled, OrderStatus::TakeProfitFilled]);
    let entry = report.records.records()[0];
    let exit = report.records.records()[1];
    assert_eq!(entry.tp_price, 0.0);
    assert_eq!(exit.bar_index, 4);
    assert_eq!(exit.exit_price, 102.0);

    // Market fee to open, limit fee to close.
    let coin = 195.43 / 100.0;
    let expected = coin * 2.0 - coin * 100.0 * FEE - coin * 102.0 * LIMIT_FEE;
    assert_eq!(report.closed_pnls.len(), 1);
    assert!((report.closed_pnls[0] - expected).abs() < 1e-9);
    assert!((report.final_equity - (1000.0 + expected)).abs() < 1e-9);
}

#[test]
fn infinite_amount_enters_at_the_exchange_cap() {
    let candles = long_series();
    let signals = SignalSeries::with_entries_at(candles.len(), &[2]);
    let exchange = ExchangeSettings {
        max_asset_size: 5.0,
        ..ExchangeSettings::default()
    };
    let st = StaticOrderSettings {
        increase_position_type: SizingMode::Amount,
        size_amount: f64::INFINITY,
        leverage_strategy_type: LeverageMode::Static,
        static_leverage: 2.0,
        ..StaticOrderSettings::default()
    };
    let report = run_single(&candles, &signals, &exchange, &st, &DynamicOrderSettings::default())
        .unwrap();
    let entry = report.records.records()[0];
    assert_eq!(entry.order_status, OrderStatus::EntryFilled);
    assert_eq!(entry.entry_size_usd, 500.0);
    assert_eq!(entry.position_size_usd, 500.0);
}

#[test]
fn adds_recompute_the_stop_and_trailing_only_tightens_between_them() {
    let candles = vec![
        bar(0, 100.0, 101.0, 99.0, 100.0),
        bar(1, 100.0, 101.0, 97.0, 100.0),
        bar(2, 100.0, 104.0, 100.0, 103.5),
        bar(3, 103.5, 104.5, 103.0, 104.0),
        bar(4, 104.0, 105.0, 103.5, 104.5),
        bar(5, 104.5, 106.0, 104.6, 105.5),
        bar(6, 105.5, 105.6, 104.8, 105.0),
        bar(7, 105.0, 105.0, 103.0, 103.5),
    ];
    let signals = SignalSeries::with_entries_at(candles.len(), &[1, 3]);
    let st = StaticOrderSettings {
        increase_position_type: SizingMode::Amount,
        size_amount: 100.0,
        leverage_strategy_type: LeverageMode::Static,
        static_leverage: 2.0,
        tp_strategy_type: TakeProfitMode::Nothing,
        allow_adds: true,
        ..StaticOrderSettings::default()
    };
    let dynamic = DynamicOrderSettings {
        max_trades: 2,
        sl_based_on_add_pct: 0.02,
        trail_sl_bcb_type: CandleBody::Close,
        trail_sl_when_pct: 0.02,
        trail_sl_by_pct: 0.01,
        ..DynamicOrderSettings::default()
    };
    let report = run_single(&candles, &signals, &ExchangeSettings::default(), &st, &dynamic).unwrap();

    let rows: Vec<_> = report
        .records
        .iter()
        .map(|r| (r.bar_index, r.order_status))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, OrderStatus::EntryFilled),
            (2, OrderStatus::MovedTsl),
            (3, OrderStatus::MovedTsl),
            (3, OrderStatus::EntryFilled),
            (5, OrderStatus::MovedTsl),
            (7, OrderStatus::StopLossFilled),
        ]
    );
    let recs = report.records.records();

    // Each entry places a fresh stop 2% under its bar's low, even when that
    // is looser than the trailed level it replaces.
    assert!((recs[0].sl_price - 97.0 * 0.98).abs() < 0.011);
    assert!((recs[3].sl_price - 103.0 * 0.98).abs() < 0.011);
    assert!(recs[3].sl_price < recs[2].sl_price);
    assert_eq!(recs[3].total_trades, 2);
    assert_eq!(recs[3].position_size_usd, 200.0);

    // Between entries the stop only moves up.
    assert!(recs[1].sl_price > recs[0].sl_price);
    assert!(recs[2].sl_price > recs[1].sl_price);
    assert!(recs[4].sl_price > recs[3].sl_price);
    assert!((recs[4].sl_price - 105.5 * 0.99).abs() < 0.011);

    assert_eq!(recs[5].exit_price, recs[4].sl_price);
    assert!(report.closed_pnls[0] > 0.0);
}
