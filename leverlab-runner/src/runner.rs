//! Single-run entry point: one grid point, full order record log.
//!
//! Used by the CLI to inspect a settings index the sweep reported, and by
//! anything that wants the event log rather than a summary row.

use thiserror::Error;

use leverlab_core::domain::Candle;
use leverlab_core::engine::{LifecycleError, LifecycleReport, OrderLifecycle};
use leverlab_core::signals::{Strategy, StrategyError};

use crate::config::{ConfigError, SweepConfig};
use crate::grid::{GridError, GridPoint, SettingsGrid};
use crate::metrics::RunMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
    #[error("settings index {index} is outside the grid (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("settings index {0} is excluded by the grid validity rule")]
    InvalidPoint(usize),
    #[error("signal generation failed: {0}")]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Complete result of a single run.
#[derive(Debug, Clone)]
pub struct SingleRun {
    pub point: GridPoint,
    pub metrics: RunMetrics,
    pub report: LifecycleReport,
}

/// Runs grid point `settings_index` over `candles`.
pub fn run_settings_index(
    config: &SweepConfig,
    strategy: &dyn Strategy,
    candles: &[Candle],
    settings_index: usize,
) -> Result<SingleRun, RunError> {
    config.validate()?;
    let grid = SettingsGrid::for_strategy(config.grid.clone(), strategy)?;
    let point = grid
        .point(settings_index)
        .ok_or(RunError::IndexOutOfRange {
            index: settings_index,
            len: grid.len(),
        })?;
    if !SettingsGrid::is_valid(&point, strategy) {
        return Err(RunError::InvalidPoint(settings_index));
    }

    let signals = strategy.signals(candles, &point.indicator_params)?;
    let report = OrderLifecycle::new(
        settings_index,
        &config.exchange,
        &config.static_order,
        &point.dynamic,
    )?
    .run(candles, &signals)?;

    Ok(SingleRun {
        metrics: RunMetrics::compute(&report),
        point,
        report,
    })
}
