//! LeverLab Runner — sweep scheduling, result filtering, diagnostics, export.
//!
//! This crate builds on `leverlab-core` to provide:
//! - TOML sweep configuration with a content fingerprint
//! - The lazily decoded settings grid and its validity rule
//! - Contiguous partitioning of the grid across workers
//! - The parallel sweep scheduler with per-index failure isolation
//! - Per-run metrics, result filters, and sweep diagnostics
//! - Candle CSV loading and JSON/CSV export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod grid;
pub mod metrics;
pub mod partition;
pub mod result;
pub mod runner;
pub mod sweep;

pub use config::{BacktestFilters, ConfigError, GridConfig, SchedulerConfig, SweepConfig};
pub use data_loader::{load_candles, read_candles, synthetic_candles, LoadError, LoadedCandles};
pub use export::ExportError;
pub use grid::{GridError, GridPoint, SettingsGrid};
pub use metrics::RunMetrics;
pub use partition::{Partition, PartitionError};
pub use result::{FailedRun, ResultRow, SweepDiagnostics, SweepReport};
pub use runner::{run_settings_index, RunError, SingleRun};
pub use sweep::{BacktestScheduler, SweepError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<SweepConfig>();
        assert_sync::<SweepConfig>();
    }

    #[test]
    fn scheduler_is_send_sync() {
        assert_send::<BacktestScheduler>();
        assert_sync::<BacktestScheduler>();
        assert_sync::<SettingsGrid>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<SweepReport>();
        assert_sync::<SweepReport>();
        assert_send::<ResultRow>();
        assert_send::<SweepDiagnostics>();
    }
}
