// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators shown on the
// dashboard.  Every public function returns `Option<T>` (or an explicit
// `Unknown` label) so callers are forced to handle insufficient-history and
// zero-division cases instead of receiving NaN.

pub mod crossover;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use crossover::{detect_crossover, CrossoverLabel};
pub use macd::current_macd;
pub use rsi::current_rsi;

/// Round `value` to `decimals` places for display.
///
/// Negative zero is normalised to `0.0` so a tiny negative residue never
/// renders as `-0.00`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_two_places() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.235001, 2), 1.24);
        assert_eq!(round_to(-0.004, 2), 0.0);
        assert!(round_to(-0.004, 2).is_sign_positive());
    }

    #[test]
    fn round_four_places() {
        assert_eq!(round_to(0.012345, 4), 0.0123);
    }
}
