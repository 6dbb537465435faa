//! Domain types for LeverLab

pub mod candle;
pub mod tick;

pub use candle::{validate_series, Candle, CandleBody};
pub use tick::{round_dp, round_to_step, round_up_to_step};
