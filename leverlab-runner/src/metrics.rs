//! Per-run summary statistics — pure functions over a lifecycle report.
//!
//! Every metric is a pure function: closed-trade pnls and/or equity in,
//! scalar out. Percentages are rounded to two decimals, the quality score
//! to three.

use serde::{Deserialize, Serialize};

use leverlab_core::engine::LifecycleReport;

use crate::config::BacktestFilters;

/// Closes with an absolute pnl at or below this count as break-even.
pub const BREAK_EVEN_TOLERANCE: f64 = 0.009;

/// Aggregate statistics for one settings index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub gains_pct: f64,
    pub win_rate: f64,
    pub qf_score: f64,
    pub fees_paid: f64,
    pub total_pnl: f64,
    pub ending_equity: f64,
}

impl RunMetrics {
    pub fn compute(report: &LifecycleReport) -> Self {
        let gains = gains_pct(report.starting_equity, report.final_equity);
        let decisive = without_break_even(&report.closed_pnls);
        let wins = decisive.iter().filter(|&&p| p > 0.0).count();
        Self {
            total_trades: report.total_trades(),
            wins,
            losses: decisive.len() - wins,
            gains_pct: gains,
            win_rate: win_rate(wins, decisive.len()),
            qf_score: qf_score(&report.closed_pnls, gains),
            fees_paid: round2(report.fees_paid),
            total_pnl: round2(report.total_pnl()),
            ending_equity: round2(report.final_equity),
        }
    }

    /// True when the run traded and beats every filter threshold.
    pub fn passes(&self, filters: &BacktestFilters) -> bool {
        self.total_trades > 0
            && self.gains_pct > filters.gains_pct_filter
            && self.total_trades > filters.total_trade_filter
            && self.qf_score > filters.qf_filter
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Percent gain over the starting equity.
pub fn gains_pct(starting_equity: f64, final_equity: f64) -> f64 {
    if starting_equity <= 0.0 {
        return 0.0;
    }
    round2((final_equity - starting_equity) / starting_equity * 100.0)
}

/// Closed pnls that are neither break-even nor float dust.
pub fn without_break_even(pnls: &[f64]) -> Vec<f64> {
    pnls.iter()
        .copied()
        .filter(|p| p.abs() > BREAK_EVEN_TOLERANCE)
        .collect()
}

/// Winning share of decisive trades, in percent.
pub fn win_rate(wins: usize, decisive: usize) -> f64 {
    if decisive == 0 {
        return 0.0;
    }
    round2(wins as f64 / decisive as f64 * 100.0)
}

/// Straightness of the cumulative pnl curve.
///
/// R² of a least-squares line through cumulative pnl against trade number,
/// negated when the run lost money. Zero with fewer than two trades or a
/// flat curve.
pub fn qf_score(pnls: &[f64], gains_pct: f64) -> f64 {
    let n = pnls.len();
    if n < 2 {
        return 0.0;
    }

    let mut cumulative = Vec::with_capacity(n);
    let mut running = 0.0;
    for p in pnls {
        running += p;
        cumulative.push(running);
    }

    let nf = n as f64;
    let mean_x = (nf + 1.0) / 2.0;
    let mean_y = cumulative.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (i, y) in cumulative.iter().enumerate() {
        let dx = (i + 1) as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if syy <= f64::EPSILON || sxx <= 0.0 {
        return 0.0;
    }

    let r_squared = (sxy * sxy) / (sxx * syy);
    let score = round3(r_squared);
    if gains_pct <= 0.0 {
        -score
    } else {
        score
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
