//! Moving Average Crossover strategy
//!
//! Enters a long when the fast SMA of closes crosses above the slow SMA, or a
//! short when it crosses below. Both periods are searched.

use crate::direction::Side;
use crate::domain::Candle;
use crate::signals::{ParamAxis, SignalSeries, Strategy, StrategyError};

/// Moving Average Crossover strategy
///
/// # Parameters
/// - `fast_periods`: candidate short SMA periods
/// - `slow_periods`: candidate long SMA periods
///
/// A grid point is valid only when `fast < slow`.
#[derive(Debug, Clone)]
pub struct SmaCross {
    side: Side,
    fast_periods: Vec<usize>,
    slow_periods: Vec<usize>,
}

impl SmaCross {
    pub fn new(side: Side, fast_periods: Vec<usize>, slow_periods: Vec<usize>) -> Self {
        Self {
            side,
            fast_periods,
            slow_periods,
        }
    }

    /// Simple moving average of closes; `None` until `period` bars exist.
    fn sma(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
        let mut out = Vec::with_capacity(candles.len());
        let mut sum = 0.0;
        for (i, c) in candles.iter().enumerate() {
            sum += c.close;
            if i >= period {
                sum -= candles[i - period].close;
            }
            out.push((i + 1 >= period).then(|| sum / period as f64));
        }
        out
    }

    fn period(name: &'static str, value: f64) -> Result<usize, StrategyError> {
        if value.fract() != 0.0 || value < 1.0 || !value.is_finite() {
            return Err(StrategyError::InvalidParam { name, value });
        }
        Ok(value as usize)
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "SMA_Cross"
    }

    fn indicator_axes(&self) -> Vec<ParamAxis> {
        vec![
            ParamAxis::new("fast_period", self.fast_periods.iter().map(|&p| p as f64).collect()),
            ParamAxis::new("slow_period", self.slow_periods.iter().map(|&p| p as f64).collect()),
        ]
    }

    fn is_valid(&self, params: &[f64]) -> bool {
        matches!(params, [fast, slow] if fast < slow)
    }

    fn signals(&self, candles: &[Candle], params: &[f64]) -> Result<SignalSeries, StrategyError> {
        let [fast, slow] = params else {
            return Err(StrategyError::ParamCount {
                expected: 2,
                got: params.len(),
            });
        };
        let fast = Self::period("fast_period", *fast)?;
        let slow = Self::period("slow_period", *slow)?;

        let fast_ma = Self::sma(candles, fast);
        let slow_ma = Self::sma(candles, slow);

        let mut entries = vec![false; candles.len()];
        for i in 1..candles.len() {
            let (Some(f_prev), Some(s_prev), Some(f_now), Some(s_now)) =
                (fast_ma[i - 1], slow_ma[i - 1], fast_ma[i], slow_ma[i])
            else {
                continue;
            };
            entries[i] = match self.side {
                Side::Long => f_prev <= s_prev && f_now > s_now,
                Side::Short => f_prev >= s_prev && f_now < s_now,
            };
        }
        Ok(SignalSeries::from_entries(entries))
    }
}
