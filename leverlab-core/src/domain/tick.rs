//! Exchange step rounding for prices, asset sizes and leverage.

/// Largest number of decimals a step is assumed to carry.
const MAX_STEP_DECIMALS: i32 = 12;

/// Truncates `value` toward zero onto a multiple of `step`.
///
/// Values that are already a whole number of steps (up to float representation
/// error) are kept on that step instead of dropping one tick.
pub fn round_to_step(value: f64, step: f64) -> f64 {
    if step.is_nan() || step <= 0.0 || !value.is_finite() {
        return value;
    }
    let ratio = value / step;
    let nearest = ratio.round();
    let steps = if (ratio - nearest).abs() <= 1e-9 * nearest.abs().max(1.0) {
        nearest
    } else {
        ratio.trunc()
    };
    round_dp(steps * step, step_decimals(step))
}

/// Rounds `value` up (away from zero for positive values) onto a multiple of `step`.
///
/// Used where truncation would move a price toward the position, such as a
/// short's liquidation price.
pub fn round_up_to_step(value: f64, step: f64) -> f64 {
    if step.is_nan() || step <= 0.0 || !value.is_finite() {
        return value;
    }
    let ratio = value / step;
    let nearest = ratio.round();
    let steps = if (ratio - nearest).abs() <= 1e-9 * nearest.abs().max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    round_dp(steps * step, step_decimals(step))
}

/// Rounds half away from zero to `decimals` places.
pub fn round_dp(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Number of decimals needed to express `step` exactly.
fn step_decimals(step: f64) -> i32 {
    let mut scaled = step;
    for d in 0..=MAX_STEP_DECIMALS {
        if (scaled - scaled.round()).abs() < 1e-9 {
            return d;
        }
        scaled *= 10.0;
    }
    MAX_STEP_DECIMALS
}
