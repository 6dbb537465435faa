//! Order engine — account state, close accounting, and the per-bar lifecycle.
//!
//! One [`OrderLifecycle`] owns the state of one settings index. It shares
//! nothing mutable with other lifecycles, so any number of them can run on
//! the same candle series at once.

pub mod accounting;
pub mod lifecycle;
pub mod state;

pub use accounting::{decrease, Decrease};
pub use lifecycle::{run_single, LifecycleError, LifecycleReport, OrderLifecycle, RejectionCounts};
pub use state::{AccountState, OrderResult};
