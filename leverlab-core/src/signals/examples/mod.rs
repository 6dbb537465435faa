//! Example strategies

pub mod sma_cross;

pub use sma_cross::SmaCross;
