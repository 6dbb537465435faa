//! Tagged results returned by the per-bar checks.

use super::OrderStatus;

/// A position-closing transition: where it fills, what it pays, and why.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitOutcome {
    pub exit_price: f64,
    pub exit_fee_pct: f64,
    pub status: OrderStatus,
}

/// A stop-loss move (break-even or trailing).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlMove {
    pub sl_price: f64,
    pub status: OrderStatus,
}
