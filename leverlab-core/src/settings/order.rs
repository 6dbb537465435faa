use serde::{Deserialize, Serialize};

use super::{check, ExchangeSettings, SettingsError};
use crate::direction::Side;
use crate::domain::CandleBody;

/// How an entry's size is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingMode {
    /// Fixed quote amount (`size_amount`), clamped to the exchange maximum.
    /// An infinite amount means "the size of the open position".
    Amount,
    /// `account_pct_risk_per_trade` of equity.
    PctAccount,
    /// Size that loses `size_amount` at the stop loss.
    RiskAmount,
    /// Size that loses `account_pct_risk_per_trade` of equity at the stop loss.
    #[default]
    RiskPctAccount,
    /// Exactly the exchange's minimum asset size.
    SmallestEntrySizeAsset,
}

impl SizingMode {
    /// Risk-based modes size off the stop-loss distance.
    pub fn needs_stop_loss(&self) -> bool {
        matches!(self, Self::RiskAmount | Self::RiskPctAccount)
    }
}

/// How leverage is chosen for an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeverageMode {
    /// `static_leverage` for every entry.
    Static,
    /// Solved from the stop-loss distance.
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopLossMode {
    Nothing,
    /// Lookback extreme of a candle body, offset by `sl_based_on_add_pct`.
    #[default]
    SlBasedOnCandleBody,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TakeProfitMode {
    Nothing,
    /// Target nets `risk_reward` times the possible loss.
    #[default]
    RiskReward,
    /// Exit prices come from the signal source.
    Provided,
}

/// Fee charged when a take profit fills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TakeProfitFee {
    #[default]
    Limit,
    Market,
}

/// Where a break-even move puts the stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakEvenTarget {
    /// Price at which closing loses nothing after both fees.
    #[default]
    ZeroLoss,
    /// Exactly the average entry.
    AverageEntry,
}

/// Strategy choices fixed for a whole sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticOrderSettings {
    #[serde(default)]
    pub long_or_short: Side,
    #[serde(default)]
    pub increase_position_type: SizingMode,
    #[serde(default)]
    pub leverage_strategy_type: LeverageMode,
    #[serde(default)]
    pub sl_strategy_type: StopLossMode,
    #[serde(default)]
    pub tp_strategy_type: TakeProfitMode,
    #[serde(default)]
    pub tp_fee_type: TakeProfitFee,
    #[serde(default)]
    pub z_or_e_type: BreakEvenTarget,
    /// First bar on which entries are considered.
    #[serde(default)]
    pub starting_bar: usize,
    pub starting_equity: f64,
    #[serde(default = "default_static_leverage")]
    pub static_leverage: f64,
    /// Quote amount for [`SizingMode::Amount`] and [`SizingMode::RiskAmount`].
    #[serde(default)]
    pub size_amount: f64,
    /// Whether an entry signal while in a position adds to it.
    #[serde(default = "default_allow_adds")]
    pub allow_adds: bool,
}

fn default_static_leverage() -> f64 {
    1.0
}

fn default_allow_adds() -> bool {
    true
}

impl Default for StaticOrderSettings {
    fn default() -> Self {
        Self {
            long_or_short: Side::Long,
            increase_position_type: SizingMode::RiskPctAccount,
            leverage_strategy_type: LeverageMode::Dynamic,
            sl_strategy_type: StopLossMode::SlBasedOnCandleBody,
            tp_strategy_type: TakeProfitMode::RiskReward,
            tp_fee_type: TakeProfitFee::Limit,
            z_or_e_type: BreakEvenTarget::ZeroLoss,
            starting_bar: 0,
            starting_equity: 1000.0,
            static_leverage: 1.0,
            size_amount: 0.0,
            allow_adds: true,
        }
    }
}

impl StaticOrderSettings {
    pub fn validate(&self, exchange: &ExchangeSettings) -> Result<(), SettingsError> {
        check("starting_equity", self.starting_equity, "> 0", |v| {
            v > 0.0 && v.is_finite()
        })?;

        if self.leverage_strategy_type == LeverageMode::Static {
            check(
                "static_leverage",
                self.static_leverage,
                "within the exchange leverage bounds",
                |v| v >= exchange.min_leverage && v <= exchange.max_leverage,
            )?;
        }

        match self.increase_position_type {
            SizingMode::Amount => check("size_amount", self.size_amount, "> 0", |v| v > 0.0)?,
            SizingMode::RiskAmount => check("size_amount", self.size_amount, "> 0 and finite", |v| {
                v > 0.0 && v.is_finite()
            })?,
            _ => {}
        }

        let has_sl = self.sl_strategy_type != StopLossMode::Nothing;
        if self.increase_position_type.needs_stop_loss() && !has_sl {
            return Err(SettingsError::Incompatible(
                "risk-based sizing requires a stop-loss strategy",
            ));
        }
        if self.leverage_strategy_type == LeverageMode::Dynamic && !has_sl {
            return Err(SettingsError::Incompatible(
                "dynamic leverage requires a stop-loss strategy",
            ));
        }
        if self.tp_strategy_type == TakeProfitMode::RiskReward && !has_sl {
            return Err(SettingsError::Incompatible(
                "risk:reward take profit requires a stop-loss strategy",
            ));
        }
        Ok(())
    }

    /// Exit fee charged when a take profit fills.
    pub fn tp_fee_pct(&self, exchange: &ExchangeSettings) -> f64 {
        match self.tp_fee_type {
            TakeProfitFee::Limit => exchange.limit_fee_pct,
            TakeProfitFee::Market => exchange.market_fee_pct,
        }
    }
}

/// One point of the searched parameter grid.
///
/// Percentages are fractions. `max_equity_risk_pct == 0` disables the
/// equity-risk cap; a `Nothing` candle body disables the break-even or
/// trailing rule it selects for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicOrderSettings {
    pub account_pct_risk_per_trade: f64,
    #[serde(default)]
    pub max_equity_risk_pct: f64,
    pub max_trades: u32,
    pub risk_reward: f64,
    pub sl_based_on_add_pct: f64,
    pub sl_based_on_lookback: usize,
    pub sl_bcb_type: CandleBody,
    pub sl_to_be_cb_type: CandleBody,
    pub sl_to_be_when_pct: f64,
    pub trail_sl_bcb_type: CandleBody,
    pub trail_sl_by_pct: f64,
    pub trail_sl_when_pct: f64,
}

impl Default for DynamicOrderSettings {
    fn default() -> Self {
        Self {
            account_pct_risk_per_trade: 0.01,
            max_equity_risk_pct: 0.0,
            max_trades: 1,
            risk_reward: 2.0,
            sl_based_on_add_pct: 0.0,
            sl_based_on_lookback: 0,
            sl_bcb_type: CandleBody::Low,
            sl_to_be_cb_type: CandleBody::Nothing,
            sl_to_be_when_pct: 0.0,
            trail_sl_bcb_type: CandleBody::Nothing,
            trail_sl_by_pct: 0.0,
            trail_sl_when_pct: 0.0,
        }
    }
}

impl DynamicOrderSettings {
    pub fn validate(&self, static_os: &StaticOrderSettings) -> Result<(), SettingsError> {
        let fraction = |v: f64| (0.0..=1.0).contains(&v);
        let non_negative = |v: f64| v >= 0.0 && v.is_finite();

        if matches!(
            static_os.increase_position_type,
            SizingMode::PctAccount | SizingMode::RiskPctAccount
        ) {
            check(
                "account_pct_risk_per_trade",
                self.account_pct_risk_per_trade,
                "in (0, 1]",
                |v| v > 0.0 && v <= 1.0,
            )?;
        }
        check("max_equity_risk_pct", self.max_equity_risk_pct, "in [0, 1]", fraction)?;
        check("max_trades", f64::from(self.max_trades), ">= 1", |v| v >= 1.0)?;
        if static_os.tp_strategy_type == TakeProfitMode::RiskReward {
            check("risk_reward", self.risk_reward, "> 0", |v| v > 0.0 && v.is_finite())?;
        }
        check("sl_based_on_add_pct", self.sl_based_on_add_pct, "in [0, 1)", |v| {
            (0.0..1.0).contains(&v)
        })?;
        check("sl_to_be_when_pct", self.sl_to_be_when_pct, ">= 0", non_negative)?;
        check("trail_sl_by_pct", self.trail_sl_by_pct, "in [0, 1)", |v| {
            (0.0..1.0).contains(&v)
        })?;
        check("trail_sl_when_pct", self.trail_sl_when_pct, ">= 0", non_negative)?;

        if static_os.sl_strategy_type == StopLossMode::SlBasedOnCandleBody
            && !self.sl_bcb_type.is_enabled()
        {
            return Err(SettingsError::Incompatible(
                "candle-body stop loss needs a candle body",
            ));
        }
        Ok(())
    }

    /// Grid validity rule: a trailing stop must activate further out than it trails.
    pub fn is_valid_combination(&self) -> bool {
        !self.trail_sl_bcb_type.is_enabled() || self.trail_sl_when_pct > self.trail_sl_by_pct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let ex = ExchangeSettings::default();
        let st = StaticOrderSettings::default();
        assert!(st.validate(&ex).is_ok());
        assert!(DynamicOrderSettings::default().validate(&st).is_ok());
    }

    #[test]
    fn dynamic_leverage_needs_stop_loss() {
        let st = StaticOrderSettings {
            sl_strategy_type: StopLossMode::Nothing,
            increase_position_type: SizingMode::PctAccount,
            tp_strategy_type: TakeProfitMode::Nothing,
            ..StaticOrderSettings::default()
        };
        assert_eq!(
            st.validate(&ExchangeSettings::default()),
            Err(SettingsError::Incompatible(
                "dynamic leverage requires a stop-loss strategy"
            ))
        );
    }

    #[test]
    fn static_leverage_must_fit_exchange() {
        let st = StaticOrderSettings {
            leverage_strategy_type: LeverageMode::Static,
            static_leverage: 250.0,
            ..StaticOrderSettings::default()
        };
        assert!(st.validate(&ExchangeSettings::default()).is_err());
    }

    #[test]
    fn amount_mode_accepts_infinite_amount() {
        let st = StaticOrderSettings {
            increase_position_type: SizingMode::Amount,
            size_amount: f64::INFINITY,
            ..StaticOrderSettings::default()
        };
        assert!(st.validate(&ExchangeSettings::default()).is_ok());
    }

    #[test]
    fn rejects_zero_max_trades() {
        let dos = DynamicOrderSettings {
            max_trades: 0,
            ..DynamicOrderSettings::default()
        };
        assert!(dos.validate(&StaticOrderSettings::default()).is_err());
    }

    #[test]
    fn trailing_validity_rule() {
        let mut dos = DynamicOrderSettings {
            trail_sl_bcb_type: CandleBody::Close,
            trail_sl_by_pct: 0.02,
            trail_sl_when_pct: 0.01,
            ..DynamicOrderSettings::default()
        };
        assert!(!dos.is_valid_combination());
        dos.trail_sl_when_pct = 0.03;
        assert!(dos.is_valid_combination());
        dos.trail_sl_bcb_type = CandleBody::Nothing;
        dos.trail_sl_when_pct = 0.0;
        assert!(dos.is_valid_combination());
    }

    #[test]
    fn enums_serialize_screaming_snake() {
        let st = StaticOrderSettings::default();
        let json = serde_json::to_string(&st).unwrap();
        assert!(json.contains("\"RISK_PCT_ACCOUNT\""));
        assert!(json.contains("\"SL_BASED_ON_CANDLE_BODY\""));
        assert!(json.contains("\"LONG\""));
    }

    #[test]
    fn tp_fee_follows_type() {
        let ex = ExchangeSettings::default();
        let mut st = StaticOrderSettings::default();
        assert_eq!(st.tp_fee_pct(&ex), ex.limit_fee_pct);
        st.tp_fee_type = TakeProfitFee::Market;
        assert_eq!(st.tp_fee_pct(&ex), ex.market_fee_pct);
    }
}
