//! Sweep results and run diagnostics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leverlab_core::engine::RejectionCounts;
use leverlab_core::orders::OrderStatus;
use leverlab_core::settings::DynamicOrderSettings;

use crate::metrics::RunMetrics;

/// Current schema version for persisted sweep reports.
pub const SCHEMA_VERSION: u32 = 1;

/// One settings index that passed the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub settings_index: usize,
    pub metrics: RunMetrics,
    pub indicator_params: Vec<f64>,
    pub dynamic: DynamicOrderSettings,
}

/// A settings index that aborted. The rest of the sweep is unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRun {
    pub settings_index: usize,
    pub bar_index: Option<usize>,
    pub message: String,
}

/// Counters for one worker's range, or the whole sweep once merged.
///
/// `evaluated + invalid_points == total_points` and
/// `passed + filtered_out + failed == evaluated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepDiagnostics {
    pub total_points: usize,
    pub invalid_points: usize,
    pub evaluated: usize,
    pub passed: usize,
    pub filtered_out: usize,
    pub failed: usize,
    pub failures: Vec<FailedRun>,
    pub status_counts: BTreeMap<OrderStatus, usize>,
    pub rejections: RejectionCounts,
}

impl SweepDiagnostics {
    pub fn record_failure(&mut self, failure: FailedRun) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn add_status_counts(&mut self, counts: &BTreeMap<OrderStatus, usize>) {
        for (status, n) in counts {
            *self.status_counts.entry(*status).or_default() += n;
        }
    }

    /// Folds another range's counters in. Failures keep arrival order, so
    /// merging ranges in ascending order keeps them sorted by index.
    pub fn merge(&mut self, other: SweepDiagnostics) {
        self.total_points += other.total_points;
        self.invalid_points += other.invalid_points;
        self.evaluated += other.evaluated;
        self.passed += other.passed;
        self.filtered_out += other.filtered_out;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        self.add_status_counts(&other.status_counts);
        self.rejections.merge(&other.rejections);
    }
}

/// Everything a sweep produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Content hash of the sweep configuration.
    pub config_fingerprint: String,
    pub strategy: String,
    pub indicator_names: Vec<String>,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    /// Passing rows, ascending by settings index.
    pub rows: Vec<ResultRow>,
    pub diagnostics: SweepDiagnostics,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl SweepReport {
    /// Rows ordered by quality score, best first.
    pub fn ranked_by_qf(&self) -> Vec<&ResultRow> {
        let mut ranked: Vec<&ResultRow> = self.rows.iter().collect();
        ranked.sort_by(|a, b| {
            b.metrics
                .qf_score
                .total_cmp(&a.metrics.qf_score)
                .then(a.settings_index.cmp(&b.settings_index))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leverlab_core::orders::RejectReason;

    #[test]
    fn merge_adds_counters_and_keeps_failure_order() {
        let mut a = SweepDiagnostics {
            total_points: 4,
            evaluated: 3,
            invalid_points: 1,
            passed: 2,
            ..Default::default()
        };
        a.record_failure(FailedRun {
            settings_index: 1,
            bar_index: Some(7),
            message: "a".into(),
        });
        a.status_counts.insert(OrderStatus::EntryFilled, 2);
        a.rejections.record(RejectReason::SizeTooSmall);

        let mut b = SweepDiagnostics {
            total_points: 2,
            evaluated: 2,
            filtered_out: 1,
            ..Default::default()
        };
        b.record_failure(FailedRun {
            settings_index: 5,
            bar_index: None,
            message: "b".into(),
        });
        b.status_counts.insert(OrderStatus::EntryFilled, 1);
        b.status_counts.insert(OrderStatus::StopLossFilled, 1);
        b.rejections.record(RejectReason::SizeTooSmall);

        a.merge(b);
        assert_eq!(a.total_points, 6);
        assert_eq!(a.evaluated, 5);
        assert_eq!(a.failed, 2);
        assert_eq!(
            a.failures.iter().map(|f| f.settings_index).collect::<Vec<_>>(),
            vec![1, 5]
        );
        assert_eq!(a.status_counts[&OrderStatus::EntryFilled], 3);
        assert_eq!(a.status_counts[&OrderStatus::StopLossFilled], 1);
        assert_eq!(a.rejections.get(RejectReason::SizeTooSmall), 2);
    }
}
