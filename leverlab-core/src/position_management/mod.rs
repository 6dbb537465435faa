/// Position management: initial stop, stop-loss hits, break-even and
/// trailing moves, and take-profit targets.
///
/// **Module Structure:**
/// - `ratchet`: stops may tighten, never loosen
/// - `stop_loss`: StopLossEngine
/// - `take_profit`: TakeProfitEngine
pub mod ratchet;
pub mod stop_loss;
pub mod take_profit;

pub use ratchet::RatchetState;
pub use stop_loss::StopLossEngine;
pub use take_profit::{TakeProfit, TakeProfitEngine};
