//! Entry/exit signals — the boundary to strategy logic.
//!
//! The order engine never computes indicators. It consumes a
//! [`SignalSource`]: per bar, an "enter now" flag and, for provided
//! take-profit mode, an optional exit price. A [`Strategy`] produces a
//! [`SignalSeries`] for one point of its own indicator-parameter grid; the
//! sweep crosses those axes with the order-settings grid.
//!
//! Signals must be computed from candles only and must not look ahead: the
//! value for bar `i` may depend on bars `0..=i` and nothing later.

pub mod examples;

pub use examples::SmaCross;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Candle;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("expected {expected} indicator parameters, got {got}")]
    ParamCount { expected: usize, got: usize },

    #[error("invalid indicator parameter {name} = {value}")]
    InvalidParam { name: &'static str, value: f64 },

    #[error("signal series covers {got} bars, candles have {expected}")]
    Length { expected: usize, got: usize },
}

/// Per-bar signal lookup used by the order lifecycle.
pub trait SignalSource {
    /// Enter (or add) on this bar's close.
    fn entry(&self, bar_index: usize) -> bool;

    /// Exit price supplied for this bar, if any.
    fn exit_price(&self, bar_index: usize) -> Option<f64>;

    /// Number of bars covered.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Materialized signals for one candle series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    entries: Vec<bool>,
    exit_prices: Vec<Option<f64>>,
}

impl SignalSeries {
    /// Entry flags only; no provided exits.
    pub fn from_entries(entries: Vec<bool>) -> Self {
        let exit_prices = vec![None; entries.len()];
        Self {
            entries,
            exit_prices,
        }
    }

    pub fn new(entries: Vec<bool>, exit_prices: Vec<Option<f64>>) -> Result<Self, StrategyError> {
        if entries.len() != exit_prices.len() {
            return Err(StrategyError::Length {
                expected: entries.len(),
                got: exit_prices.len(),
            });
        }
        Ok(Self {
            entries,
            exit_prices,
        })
    }

    /// Series of `len` bars with entries on the given bar indices.
    pub fn with_entries_at(len: usize, bars: &[usize]) -> Self {
        let mut entries = vec![false; len];
        for &i in bars {
            if let Some(flag) = entries.get_mut(i) {
                *flag = true;
            }
        }
        Self::from_entries(entries)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.iter().filter(|e| **e).count()
    }
}

impl SignalSource for SignalSeries {
    fn entry(&self, bar_index: usize) -> bool {
        self.entries.get(bar_index).copied().unwrap_or(false)
    }

    fn exit_price(&self, bar_index: usize) -> Option<f64> {
        self.exit_prices.get(bar_index).copied().flatten()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One searched indicator parameter and its candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAxis {
    pub name: String,
    pub values: Vec<f64>,
}

impl ParamAxis {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Signal generator with its own indicator-parameter grid.
///
/// # Invariants
/// - `signals()` MUST be deterministic for the same candles and params
/// - `signals()` MUST NOT look ahead
pub trait Strategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Indicator parameter axes, in the order `signals()` receives them.
    fn indicator_axes(&self) -> Vec<ParamAxis>;

    /// Grid validity rule over one indicator-parameter point.
    fn is_valid(&self, _params: &[f64]) -> bool {
        true
    }

    fn signals(&self, candles: &[Candle], params: &[f64]) -> Result<SignalSeries, StrategyError>;
}

/// A strategy with no parameters that replays signals computed elsewhere.
#[derive(Debug, Clone)]
pub struct PrecomputedSignals {
    series: SignalSeries,
}

impl PrecomputedSignals {
    pub fn new(series: SignalSeries) -> Self {
        Self { series }
    }
}

impl Strategy for PrecomputedSignals {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn indicator_axes(&self) -> Vec<ParamAxis> {
        Vec::new()
    }

    fn signals(&self, candles: &[Candle], params: &[f64]) -> Result<SignalSeries, StrategyError> {
        if !params.is_empty() {
            return Err(StrategyError::ParamCount {
                expected: 0,
                got: params.len(),
            });
        }
        if self.series.len() != candles.len() {
            return Err(StrategyError::Length {
                expected: candles.len(),
                got: self.series.len(),
            });
        }
        Ok(self.series.clone())
    }
}
