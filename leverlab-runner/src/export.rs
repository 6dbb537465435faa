//! Reporting and export: JSON and CSV artifacts.
//!
//! - **JSON**: the full [`SweepReport`], schema-versioned; newer versions
//!   are rejected on load
//! - **CSV**: passing result rows and the order record log, for external
//!   analysis tools

use std::path::{Path, PathBuf};

use thiserror::Error;

use leverlab_core::orders::OrderRecord;

use crate::config::GridConfig;
use crate::result::{SweepReport, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to flush csv writer: {0}")]
    Flush(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &SweepReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Deserialize a [`SweepReport`], rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<SweepReport, ExportError> {
    let report: SweepReport = serde_json::from_str(json)?;
    if report.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: report.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export passing rows, one per settings index.
///
/// Columns: settings_index, one per indicator parameter, one per order
/// setting, then total_trades, wins, losses, gains_pct, win_rate,
/// qf_score, fees_paid, total_pnl, ending_equity.
pub fn export_results_csv(report: &SweepReport) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = vec!["settings_index".into()];
    header.extend(report.indicator_names.iter().cloned());
    header.extend(GridConfig::axis_names().iter().map(|s| s.to_string()));
    header.extend(
        [
            "total_trades",
            "wins",
            "losses",
            "gains_pct",
            "win_rate",
            "qf_score",
            "fees_paid",
            "total_pnl",
            "ending_equity",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    wtr.write_record(&header)?;

    for row in &report.rows {
        let d = &row.dynamic;
        let m = &row.metrics;
        let mut record: Vec<String> = Vec::with_capacity(header.len());
        record.push(row.settings_index.to_string());
        record.extend(row.indicator_params.iter().map(|p| p.to_string()));
        record.extend([
            d.account_pct_risk_per_trade.to_string(),
            d.max_equity_risk_pct.to_string(),
            d.max_trades.to_string(),
            d.risk_reward.to_string(),
            d.sl_based_on_add_pct.to_string(),
            d.sl_based_on_lookback.to_string(),
            format!("{:?}", d.sl_bcb_type),
            format!("{:?}", d.sl_to_be_cb_type),
            d.sl_to_be_when_pct.to_string(),
            format!("{:?}", d.trail_sl_bcb_type),
            d.trail_sl_by_pct.to_string(),
            d.trail_sl_when_pct.to_string(),
        ]);
        record.extend([
            m.total_trades.to_string(),
            m.wins.to_string(),
            m.losses.to_string(),
            format!("{:.2}", m.gains_pct),
            format!("{:.2}", m.win_rate),
            format!("{:.3}", m.qf_score),
            format!("{:.2}", m.fees_paid),
            format!("{:.2}", m.total_pnl),
            format!("{:.2}", m.ending_equity),
        ]);
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

/// Export an order record log, one row per state-changing event.
pub fn export_records_csv(records: &[OrderRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::Flush(e.to_string()))
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save a sweep's artifacts under `output_dir`:
/// - `report.json` — the full [`SweepReport`]
/// - `results.csv` — passing rows
///
/// Returns the path to `report.json`.
pub fn save_sweep(report: &SweepReport, output_dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(output_dir).map_err(|source| ExportError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let report_path = output_dir.join("report.json");
    write(&report_path, &export_json(report)?)?;
    write(&output_dir.join("results.csv"), &export_results_csv(report)?)?;
    Ok(report_path)
}

pub fn load_sweep(report_path: &Path) -> Result<SweepReport, ExportError> {
    let json = std::fs::read_to_string(report_path).map_err(|source| ExportError::Io {
        path: report_path.to_path_buf(),
        source,
    })?;
    import_json(&json)
}

/// Write `contents` to `path`, creating parent directories.
pub fn write(path: &Path, contents: &str) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
