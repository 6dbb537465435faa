//! Settings model: exchange constraints, static strategy choices, and the
//! per-run dynamic parameters searched by the sweep.
//!
//! All records are plain values. They are validated once when loaded and are
//! read-only for the rest of a run.

pub mod exchange;
pub mod order;

pub use exchange::ExchangeSettings;
pub use order::{
    BreakEvenTarget, DynamicOrderSettings, LeverageMode, SizingMode, StaticOrderSettings,
    StopLossMode, TakeProfitFee, TakeProfitMode,
};

use thiserror::Error;

/// Malformed settings. Fatal for whatever run they belong to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("incompatible settings: {0}")]
    Incompatible(&'static str),
}

/// Range check helper shared by the settings records.
pub(crate) fn check(
    field: &'static str,
    value: f64,
    expected: &'static str,
    ok: impl Fn(f64) -> bool,
) -> Result<(), SettingsError> {
    if !value.is_nan() && ok(value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            expected,
            value,
        })
    }
}
