//! Parallel parameter sweep.
//!
//! The settings-index space is split into contiguous ranges, one per
//! worker. Each worker walks its range in ascending order, owns every
//! buffer it writes, and hands back its rows and counters as a value.
//! The coordinator merges those in range order, so the merged result is
//! identical for any worker count.

use std::collections::BTreeMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use leverlab_core::domain::{validate_series, Candle};
use leverlab_core::engine::{LifecycleError, OrderLifecycle, RejectionCounts};
use leverlab_core::orders::OrderStatus;
use leverlab_core::signals::{SignalSeries, Strategy};

use crate::config::SweepConfig;
use crate::grid::{GridError, GridPoint, SettingsGrid};
use crate::metrics::RunMetrics;
use crate::partition::{Partition, PartitionError};
use crate::result::{FailedRun, ResultRow, SweepDiagnostics, SweepReport, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    #[error("partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("malformed or out-of-order candle at bar {bar_index}")]
    Candles { bar_index: usize },
}

/// What one worker produced for its range.
#[derive(Debug, Default)]
struct WorkerOutput {
    rows: Vec<ResultRow>,
    diagnostics: SweepDiagnostics,
}

/// Runs one order lifecycle per valid grid point.
pub struct BacktestScheduler {
    config: SweepConfig,
    strategy: Box<dyn Strategy>,
}

impl BacktestScheduler {
    pub fn new(config: SweepConfig, strategy: Box<dyn Strategy>) -> Self {
        Self { config, strategy }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn grid(&self) -> Result<SettingsGrid, SweepError> {
        Ok(SettingsGrid::for_strategy(
            self.config.grid.clone(),
            self.strategy.as_ref(),
        )?)
    }

    /// Sweeps the whole grid with the configured worker count.
    pub fn run(&self, candles: &[Candle]) -> Result<SweepReport, SweepError> {
        let grid = self.grid()?;
        let partition = Partition::even(grid.len(), self.config.scheduler.worker_count());
        self.run_partitioned(candles, &grid, &partition)
    }

    /// Sweeps `grid` with one worker per range of `partition`.
    pub fn run_partitioned(
        &self,
        candles: &[Candle],
        grid: &SettingsGrid,
        partition: &Partition,
    ) -> Result<SweepReport, SweepError> {
        partition.verify(grid.len())?;
        validate_series(candles).map_err(|bar_index| SweepError::Candles { bar_index })?;

        let started_at = Utc::now();
        let fingerprint = self.config.fingerprint();
        let workers = partition.workers();
        info!(
            "sweep {}: {} points ({} indicator x {} order), {} workers, strategy {}",
            &fingerprint[..12],
            grid.len(),
            grid.indicator_points(),
            grid.order_points(),
            workers,
            self.strategy.name()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()?;
        let outputs: Vec<WorkerOutput> = pool.install(|| {
            partition
                .ranges()
                .par_iter()
                .map(|range| self.run_range(candles, grid, range.clone()))
                .collect()
        });

        // ─── Merge in range order ───
        let capacity = outputs.iter().map(|o| o.rows.len()).sum();
        let mut rows = Vec::with_capacity(capacity);
        let mut diagnostics = SweepDiagnostics::default();
        for output in outputs {
            rows.extend(output.rows);
            diagnostics.merge(output.diagnostics);
        }

        let elapsed_ms = (Utc::now() - started_at).num_milliseconds();
        info!(
            "sweep {}: {} evaluated, {} passed, {} filtered out, {} failed, {} invalid in {elapsed_ms} ms",
            &fingerprint[..12],
            diagnostics.evaluated,
            diagnostics.passed,
            diagnostics.filtered_out,
            diagnostics.failed,
            diagnostics.invalid_points
        );

        Ok(SweepReport {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: fingerprint,
            strategy: self.strategy.name().to_string(),
            indicator_names: grid.indicator_names(),
            workers,
            started_at,
            elapsed_ms,
            rows,
            diagnostics,
        })
    }

    /// One worker's pass over its range.
    fn run_range(&self, candles: &[Candle], grid: &SettingsGrid, range: Range<usize>) -> WorkerOutput {
        let mut out = WorkerOutput::default();
        out.diagnostics.total_points = range.len();

        // Consecutive indices share an indicator point, so signals are
        // computed once per indicator point.
        let mut cached: Option<(usize, Result<SignalSeries, String>)> = None;

        for point in grid.points(range) {
            if !SettingsGrid::is_valid(&point, self.strategy.as_ref()) {
                out.diagnostics.invalid_points += 1;
                continue;
            }
            out.diagnostics.evaluated += 1;

            let fresh = matches!(&cached, Some((i, _)) if *i == point.indicator_index);
            if !fresh {
                let signals = match catch_panic(|| {
                    self.strategy.signals(candles, &point.indicator_params)
                }) {
                    Ok(Ok(signals)) => Ok(signals),
                    Ok(Err(e)) => Err(format!("signal generation failed: {e}")),
                    Err(message) => Err(format!("signal generation panicked: {message}")),
                };
                cached = Some((point.indicator_index, signals));
            }
            let signals = match &cached {
                Some((_, Ok(signals))) => signals,
                Some((_, Err(message))) => {
                    fail(&mut out, &point, None, message.clone());
                    continue;
                }
                None => continue,
            };

            match catch_panic(|| self.run_point(candles, &point, signals)) {
                Ok(Ok(run)) => {
                    out.diagnostics.add_status_counts(&run.status_counts);
                    out.diagnostics.rejections.merge(&run.rejections);
                    if run.metrics.passes(&self.config.filters) {
                        out.diagnostics.passed += 1;
                        out.rows.push(ResultRow {
                            settings_index: run.point.settings_index,
                            metrics: run.metrics,
                            indicator_params: run.point.indicator_params,
                            dynamic: run.point.dynamic,
                        });
                    } else {
                        out.diagnostics.filtered_out += 1;
                    }
                }
                Ok(Err(e)) => {
                    let bar_index = e.bar_index();
                    fail(&mut out, &point, bar_index, e.to_string());
                }
                Err(message) => fail(&mut out, &point, None, format!("panicked: {message}")),
            }
        }
        out
    }

    /// Runs the lifecycle for one point and summarizes it.
    fn run_point(
        &self,
        candles: &[Candle],
        point: &GridPoint,
        signals: &SignalSeries,
    ) -> Result<ScoredRun, LifecycleError> {
        let report = OrderLifecycle::new(
            point.settings_index,
            &self.config.exchange,
            &self.config.static_order,
            &point.dynamic,
        )?
        .run(candles, signals)?;

        Ok(ScoredRun {
            metrics: RunMetrics::compute(&report),
            status_counts: report.status_counts(),
            rejections: report.rejections,
            point: point.clone(),
        })
    }
}

/// A completed run before filtering.
struct ScoredRun {
    point: GridPoint,
    metrics: RunMetrics,
    status_counts: BTreeMap<OrderStatus, usize>,
    rejections: RejectionCounts,
}

fn fail(out: &mut WorkerOutput, point: &GridPoint, bar_index: Option<usize>, message: String) {
    warn!("settings index {} failed: {message}", point.settings_index);
    out.diagnostics.record_failure(FailedRun {
        settings_index: point.settings_index,
        bar_index,
        message,
    });
}

fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string())
    })
}
