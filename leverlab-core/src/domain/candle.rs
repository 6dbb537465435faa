//! Candle — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. `open_time` is epoch milliseconds and strictly increases
/// along a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Price selected by a candle-body selector. `None` for [`CandleBody::Nothing`].
    pub fn body(&self, body: CandleBody) -> Option<f64> {
        match body {
            CandleBody::Nothing => None,
            CandleBody::Open => Some(self.open),
            CandleBody::High => Some(self.high),
            CandleBody::Low => Some(self.low),
            CandleBody::Close => Some(self.close),
        }
    }

    /// Open time as a UTC datetime, if the timestamp is representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high is the top of the bar, low the bottom, prices positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }
}

/// Which price of a candle a stop-loss rule reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandleBody {
    /// Rule disabled.
    #[default]
    Nothing,
    Open,
    High,
    Low,
    Close,
}

impl CandleBody {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Nothing)
    }
}

/// Checks that a series is non-empty, every bar is sane, and timestamps strictly increase.
///
/// Returns the index of the first offending bar.
pub fn validate_series(candles: &[Candle]) -> Result<(), usize> {
    if candles.is_empty() {
        return Err(0);
    }
    let mut prev: Option<i64> = None;
    for (i, c) in candles.iter().enumerate() {
        if !c.is_sane() {
            return Err(i);
        }
        if let Some(p) = prev {
            if c.open_time <= p {
                return Err(i);
            }
        }
        prev = Some(c.open_time);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle() -> Candle {
        Candle::new(1_700_000_000_000, 100.0, 105.0, 98.0, 103.0, 50_000.0)
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn candle_detects_void() {
        let mut c = sample_candle();
        c.open = f64::NAN;
        assert!(c.is_void());
        assert!(!c.is_sane());
    }

    #[test]
    fn candle_detects_insane_high_low() {
        let mut c = sample_candle();
        c.high = 97.0;
        assert!(!c.is_sane());
    }

    #[test]
    fn body_selects_price() {
        let c = sample_candle();
        assert_eq!(c.body(CandleBody::Open), Some(100.0));
        assert_eq!(c.body(CandleBody::High), Some(105.0));
        assert_eq!(c.body(CandleBody::Low), Some(98.0));
        assert_eq!(c.body(CandleBody::Close), Some(103.0));
        assert_eq!(c.body(CandleBody::Nothing), None);
    }

    #[test]
    fn datetime_from_millis() {
        let dt = sample_candle().datetime().unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn series_must_be_strictly_increasing() {
        let a = sample_candle();
        let mut b = sample_candle();
        b.open_time = a.open_time;
        assert_eq!(validate_series(&[a, b]), Err(1));
        b.open_time = a.open_time + 60_000;
        assert_eq!(validate_series(&[a, b]), Ok(()));
        assert_eq!(validate_series(&[]), Err(0));
    }

    #[test]
    fn candle_serialization_roundtrip() {
        let c = sample_candle();
        let json = serde_json::to_string(&c).unwrap();
        let back: Candle = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
