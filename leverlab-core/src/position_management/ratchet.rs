/// Ratchet invariant enforcement
///
/// **Core Rule:** a stop loss may tighten, never loosen.
///
/// Break-even and trailing moves both go through the ratchet, so across all
/// "moved" events of one open position a long's stop never decreases and a
/// short's never increases.
use crate::direction::Side;

/// Ratchet state for one open position's stop loss.
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    /// Current stop level (high-water mark for longs, low-water mark for shorts)
    current_level: Option<f64>,

    side: Side,
}

impl RatchetState {
    pub fn new(side: Side) -> Self {
        Self {
            current_level: None,
            side,
        }
    }

    /// Moves to `proposed` only if it is strictly tighter than the current
    /// level. Returns the new level when it moved.
    ///
    /// # Example
    /// ```
    /// use leverlab_core::direction::Side;
    /// use leverlab_core::position_management::RatchetState;
    ///
    /// let mut ratchet = RatchetState::new(Side::Long);
    /// ratchet.reset(95.0);
    /// assert_eq!(ratchet.tighten(100.0), Some(100.0));
    /// assert_eq!(ratchet.tighten(90.0), None);
    /// assert_eq!(ratchet.current_level(), Some(100.0));
    /// ```
    pub fn tighten(&mut self, proposed: f64) -> Option<f64> {
        if !proposed.is_finite() {
            return None;
        }
        match self.current_level {
            Some(current) if !self.side.direction().is_tighter(proposed, current) => None,
            _ => {
                self.current_level = Some(proposed);
                Some(proposed)
            }
        }
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }

    /// Reset the ratchet to a new level, e.g. a fresh initial stop.
    pub fn reset(&mut self, new_level: f64) {
        self.current_level = Some(new_level);
    }

    pub fn clear(&mut self) {
        self.current_level = None;
    }
}
