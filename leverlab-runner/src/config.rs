//! Sweep configuration, loaded from TOML.
//!
//! ```toml
//! [exchange]
//! price_tick_step = 0.01
//! # ...
//!
//! [static_order]
//! long_or_short = "LONG"
//! starting_equity = 1000.0
//!
//! [grid]
//! account_pct_risk_per_trade = [0.01, 0.02]
//! risk_reward = [2.0, 3.0, 5.0]
//! sl_bcb_type = ["LOW"]
//!
//! [filters]
//! gains_pct_filter = 0.0
//! total_trade_filter = 5
//! qf_filter = 0.5
//!
//! [scheduler]
//! workers = 0   # one per available thread
//! ```
//!
//! Grid axes left out of the file hold the single default value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use leverlab_core::domain::CandleBody;
use leverlab_core::settings::{
    DynamicOrderSettings, ExchangeSettings, SettingsError, StaticOrderSettings,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("grid axis {0} has no values")]
    EmptyAxis(&'static str),
}

/// Everything a sweep needs besides candles and a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub static_order: StaticOrderSettings,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub filters: BacktestFilters,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl SweepConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks the fixed settings and that every grid axis has values.
    ///
    /// Individual grid values are not checked here: a grid point with a
    /// malformed value fails on its own when it is run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.exchange.validate()?;
        self.static_order.validate(&self.exchange)?;
        self.grid.check_axes()
    }

    /// Content hash of the configuration (blake3 over its JSON form).
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Candidate values per [`DynamicOrderSettings`] field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub account_pct_risk_per_trade: Vec<f64>,
    pub max_equity_risk_pct: Vec<f64>,
    pub max_trades: Vec<u32>,
    pub risk_reward: Vec<f64>,
    pub sl_based_on_add_pct: Vec<f64>,
    pub sl_based_on_lookback: Vec<usize>,
    pub sl_bcb_type: Vec<CandleBody>,
    pub sl_to_be_cb_type: Vec<CandleBody>,
    pub sl_to_be_when_pct: Vec<f64>,
    pub trail_sl_bcb_type: Vec<CandleBody>,
    pub trail_sl_by_pct: Vec<f64>,
    pub trail_sl_when_pct: Vec<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::single(&DynamicOrderSettings::default())
    }
}

impl GridConfig {
    /// Number of order-settings axes.
    pub const AXES: usize = 12;

    /// One-point grid.
    pub fn single(d: &DynamicOrderSettings) -> Self {
        Self {
            account_pct_risk_per_trade: vec![d.account_pct_risk_per_trade],
            max_equity_risk_pct: vec![d.max_equity_risk_pct],
            max_trades: vec![d.max_trades],
            risk_reward: vec![d.risk_reward],
            sl_based_on_add_pct: vec![d.sl_based_on_add_pct],
            sl_based_on_lookback: vec![d.sl_based_on_lookback],
            sl_bcb_type: vec![d.sl_bcb_type],
            sl_to_be_cb_type: vec![d.sl_to_be_cb_type],
            sl_to_be_when_pct: vec![d.sl_to_be_when_pct],
            trail_sl_bcb_type: vec![d.trail_sl_bcb_type],
            trail_sl_by_pct: vec![d.trail_sl_by_pct],
            trail_sl_when_pct: vec![d.trail_sl_when_pct],
        }
    }

    /// Axis lengths in enumeration order, slowest first.
    pub fn radices(&self) -> [usize; Self::AXES] {
        [
            self.account_pct_risk_per_trade.len(),
            self.max_equity_risk_pct.len(),
            self.max_trades.len(),
            self.risk_reward.len(),
            self.sl_based_on_add_pct.len(),
            self.sl_based_on_lookback.len(),
            self.sl_bcb_type.len(),
            self.sl_to_be_cb_type.len(),
            self.sl_to_be_when_pct.len(),
            self.trail_sl_bcb_type.len(),
            self.trail_sl_by_pct.len(),
            self.trail_sl_when_pct.len(),
        ]
    }

    pub fn axis_names() -> [&'static str; Self::AXES] {
        [
            "account_pct_risk_per_trade",
            "max_equity_risk_pct",
            "max_trades",
            "risk_reward",
            "sl_based_on_add_pct",
            "sl_based_on_lookback",
            "sl_bcb_type",
            "sl_to_be_cb_type",
            "sl_to_be_when_pct",
            "trail_sl_bcb_type",
            "trail_sl_by_pct",
            "trail_sl_when_pct",
        ]
    }

    /// Settings for one digit per axis, in [`GridConfig::radices`] order.
    pub fn settings_at(&self, digits: &[usize; Self::AXES]) -> DynamicOrderSettings {
        DynamicOrderSettings {
            account_pct_risk_per_trade: self.account_pct_risk_per_trade[digits[0]],
            max_equity_risk_pct: self.max_equity_risk_pct[digits[1]],
            max_trades: self.max_trades[digits[2]],
            risk_reward: self.risk_reward[digits[3]],
            sl_based_on_add_pct: self.sl_based_on_add_pct[digits[4]],
            sl_based_on_lookback: self.sl_based_on_lookback[digits[5]],
            sl_bcb_type: self.sl_bcb_type[digits[6]],
            sl_to_be_cb_type: self.sl_to_be_cb_type[digits[7]],
            sl_to_be_when_pct: self.sl_to_be_when_pct[digits[8]],
            trail_sl_bcb_type: self.trail_sl_bcb_type[digits[9]],
            trail_sl_by_pct: self.trail_sl_by_pct[digits[10]],
            trail_sl_when_pct: self.trail_sl_when_pct[digits[11]],
        }
    }

    fn check_axes(&self) -> Result<(), ConfigError> {
        for (name, len) in Self::axis_names().into_iter().zip(self.radices()) {
            if len == 0 {
                return Err(ConfigError::EmptyAxis(name));
            }
        }
        Ok(())
    }
}

/// Result filters. A combination is kept when it traded at all and beats
/// every threshold strictly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestFilters {
    pub gains_pct_filter: f64,
    pub total_trade_filter: usize,
    pub qf_filter: f64,
}

impl Default for BacktestFilters {
    fn default() -> Self {
        Self {
            gains_pct_filter: f64::NEG_INFINITY,
            total_trade_filter: 0,
            qf_filter: f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads; 0 means one per available thread.
    pub workers: usize,
}

impl SchedulerConfig {
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        }
    }
}
