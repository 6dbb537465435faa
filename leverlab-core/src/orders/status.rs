use serde::{Deserialize, Serialize};

/// State-changing events written to the order record log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    EntryFilled,
    StopLossFilled,
    TakeProfitFilled,
    LiquidationFilled,
    MovedSlToBe,
    MovedTsl,
    HitMaxTrades,
}

impl OrderStatus {
    /// True for statuses that close the position.
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            Self::StopLossFilled | Self::TakeProfitFilled | Self::LiquidationFilled
        )
    }
}

/// Why an entry attempt was turned into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    SizeTooSmall,
    SizeTooBig,
    MaxTrades,
    CashUsedExceed,
    MaxEquityRisk,
    /// The stop loss is not on the losing side of the entry price.
    StopLossNotAdverse,
}
