use serde::{Deserialize, Serialize};

use super::{check, SettingsError};

/// Exchange constraints for one instrument. Loaded once, read-only afterwards.
///
/// Sizes are in units of the traded asset; fees and the maintenance margin
/// rate are fractions (0.0006 = 0.06%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    pub asset_tick_step: f64,
    pub leverage_tick_step: f64,
    pub limit_fee_pct: f64,
    pub market_fee_pct: f64,
    pub max_asset_size: f64,
    pub max_leverage: f64,
    pub min_asset_size: f64,
    pub min_leverage: f64,
    pub mmr_pct: f64,
    pub price_tick_step: f64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            asset_tick_step: 0.001,
            leverage_tick_step: 0.01,
            limit_fee_pct: 0.0002,
            market_fee_pct: 0.0006,
            max_asset_size: 100.0,
            max_leverage: 100.0,
            min_asset_size: 0.001,
            min_leverage: 1.0,
            mmr_pct: 0.005,
            price_tick_step: 0.01,
        }
    }
}

impl ExchangeSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = |v: f64| v > 0.0 && v.is_finite();
        let fraction = |v: f64| (0.0..1.0).contains(&v);

        check("asset_tick_step", self.asset_tick_step, "> 0", positive)?;
        check("leverage_tick_step", self.leverage_tick_step, "> 0", positive)?;
        check("price_tick_step", self.price_tick_step, "> 0", positive)?;
        check("limit_fee_pct", self.limit_fee_pct, "in [0, 1)", fraction)?;
        check("market_fee_pct", self.market_fee_pct, "in [0, 1)", fraction)?;
        check("mmr_pct", self.mmr_pct, "in [0, 1)", fraction)?;
        check("min_leverage", self.min_leverage, ">= 1", |v| v >= 1.0)?;
        check("max_leverage", self.max_leverage, ">= min_leverage", |v| {
            v >= self.min_leverage && v.is_finite()
        })?;
        check("min_asset_size", self.min_asset_size, ">= 0", |v| v >= 0.0)?;
        check("max_asset_size", self.max_asset_size, ">= min_asset_size", |v| {
            v >= self.min_asset_size
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ExchangeSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_tick() {
        let ex = ExchangeSettings {
            price_tick_step: 0.0,
            ..ExchangeSettings::default()
        };
        assert!(matches!(
            ex.validate(),
            Err(SettingsError::OutOfRange {
                field: "price_tick_step",
                ..
            })
        ));
    }

    #[test]
    fn rejects_inverted_leverage_bounds() {
        let ex = ExchangeSettings {
            min_leverage: 10.0,
            max_leverage: 5.0,
            ..ExchangeSettings::default()
        };
        assert!(ex.validate().is_err());
    }

    #[test]
    fn rejects_nan_fee() {
        let ex = ExchangeSettings {
            market_fee_pct: f64::NAN,
            ..ExchangeSettings::default()
        };
        assert!(ex.validate().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let ex = ExchangeSettings::default();
        let text = toml::to_string(&ex).unwrap();
        let back: ExchangeSettings = toml::from_str(&text).unwrap();
        assert_eq!(ex, back);
    }
}
