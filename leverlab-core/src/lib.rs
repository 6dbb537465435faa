//! LeverLab Core — order/risk state engine for leveraged backtests.
//!
//! This crate contains:
//! - Domain types (candles, candle bodies, tick rounding)
//! - Settings model (exchange constraints, static strategy choices, the
//!   dynamic parameters searched by a sweep)
//! - Long/short price math behind the [`direction::Direction`] trait
//! - Position sizing, leverage and liquidation, stop-loss and take-profit engines
//! - The per-bar order lifecycle and its append-only record log
//! - The signal-source and strategy contracts

pub mod direction;
pub mod domain;
pub mod engine;
pub mod leverage;
pub mod orders;
pub mod position_management;
pub mod settings;
pub mod signals;
pub mod sizers;

pub use direction::{Direction, Side};
pub use domain::{Candle, CandleBody};
pub use engine::{run_single, AccountState, LifecycleError, LifecycleReport, OrderLifecycle, OrderResult};
pub use orders::{OrderRecord, OrderRecordLog, OrderStatus, RejectReason};
pub use settings::{DynamicOrderSettings, ExchangeSettings, SettingsError, StaticOrderSettings};
pub use signals::{ParamAxis, SignalSeries, SignalSource, Strategy, StrategyError};
