//! Candle loading for the runner.
//!
//! Candles come from a CSV file with the columns
//! `open_time,open,high,low,close[,volume][,entry][,exit_price]`.
//! When an `entry` column is present the file also carries its own
//! signals: `entry` is truthy (`1`, `true`) on bars that enter, and
//! `exit_price` is optional per bar.
//!
//! Synthetic candles are a developer-only debug mode.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use leverlab_core::domain::{validate_series, Candle};
use leverlab_core::signals::{SignalSeries, StrategyError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read candles from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed candle CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("candle file has no rows")]
    Empty,

    #[error("malformed or out-of-order candle at row {0}")]
    Malformed(usize),

    #[error("bad entry flag {value:?} at row {row}")]
    EntryFlag { row: usize, value: String },

    #[error("signal columns: {0}")]
    Signals(#[from] StrategyError),
}

/// Candles plus any signals carried by the same file.
#[derive(Debug, Clone)]
pub struct LoadedCandles {
    pub candles: Vec<Candle>,
    pub signals: Option<SignalSeries>,
    /// BLAKE3 over every candle value, for fingerprinting.
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    entry: Option<String>,
    #[serde(default)]
    exit_price: Option<f64>,
}

pub fn load_candles(path: &Path) -> Result<LoadedCandles, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_candles(file)
}

/// Parses candle CSV from any reader.
pub fn read_candles<R: std::io::Read>(reader: R) -> Result<LoadedCandles, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let has_signals = rdr.headers()?.iter().any(|h| h == "entry");

    let mut candles = Vec::new();
    let mut entries = Vec::new();
    let mut exit_prices = Vec::new();
    for (row, record) in rdr.deserialize::<CandleRow>().enumerate() {
        let r = record?;
        candles.push(Candle::new(r.open_time, r.open, r.high, r.low, r.close, r.volume));
        if has_signals {
            entries.push(parse_entry(row, r.entry.as_deref())?);
            exit_prices.push(r.exit_price);
        }
    }

    if candles.is_empty() {
        return Err(LoadError::Empty);
    }
    validate_series(&candles).map_err(LoadError::Malformed)?;

    let signals = if has_signals {
        Some(SignalSeries::new(entries, exit_prices)?)
    } else {
        None
    };
    Ok(LoadedCandles {
        dataset_hash: compute_dataset_hash(&candles),
        candles,
        signals,
        synthetic: false,
    })
}

fn parse_entry(row: usize, value: Option<&str>) -> Result<bool, LoadError> {
    match value.unwrap_or("") {
        "" | "0" | "false" | "FALSE" | "False" => Ok(false),
        "1" | "true" | "TRUE" | "True" => Ok(true),
        other => Err(LoadError::EntryFlag {
            row,
            value: other.to_string(),
        }),
    }
}

/// Stable hash of the candle values, independent of how they were loaded.
fn compute_dataset_hash(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.open_time.to_le_bytes());
        hasher.update(&c.open.to_le_bytes());
        hasher.update(&c.high.to_le_bytes());
        hasher.update(&c.low.to_le_bytes());
        hasher.update(&c.close.to_le_bytes());
        hasher.update(&c.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate synthetic candles for testing/development.
///
/// A random walk from 100.0, one candle per `interval_ms`, seeded from
/// `seed` so the same seed always yields the same series.
pub fn synthetic_candles(seed: &str, bars: usize, interval_ms: i64) -> LoadedCandles {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed_bytes = blake3::hash(seed.as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

    let mut candles = Vec::with_capacity(bars);
    let mut price = 100.0_f64;
    for i in 0..bars {
        let ret: f64 = rng.gen_range(-0.02..0.02);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(1_000.0..100_000.0);
        candles.push(Candle::new(i as i64 * interval_ms, open, high, low, close, volume));
        price = close;
    }

    LoadedCandles {
        dataset_hash: compute_dataset_hash(&candles),
        candles,
        signals: None,
        synthetic: true,
    }
}
