// =============================================================================
// Simple Moving Average (SMA) — trailing window
// =============================================================================
//
// SMA_t = mean(values[t - window + 1 ..= t])
//
// The output is aligned index-for-index with the input: the first
// `window - 1` positions have no value because the window is not yet full.
// Each window is summed directly rather than with a running add/subtract so
// that an all-zero window averages to exactly 0.0.
// =============================================================================

/// Compute the trailing SMA of `values` aligned to the input indices.
///
/// # Edge cases
/// - `window == 0` => every entry is `None`
/// - `values.len() < window` => every entry is `None`
/// - A window containing a non-finite value yields `None` at that index.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return result;
    }

    let width = window as f64;
    for (offset, slice) in values.windows(window).enumerate() {
        let mean = slice.iter().sum::<f64>() / width;
        if mean.is_finite() {
            result[offset + window - 1] = Some(mean);
        }
    }

    result
}

/// Mean of the last `window` values, if there are enough of them.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let mean = values[values.len() - window..].iter().sum::<f64>() / window as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_aligns_to_input() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = rolling_mean(&values, 3);
        assert_eq!(sma.len(), 5);
        assert_eq!(sma[0], None);
        assert_eq!(sma[1], None);
        assert_eq!(sma[2], Some(2.0));
        assert_eq!(sma[3], Some(3.0));
        assert_eq!(sma[4], Some(4.0));
    }

    #[test]
    fn rolling_mean_window_zero() {
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn rolling_mean_short_input() {
        let sma = rolling_mean(&[1.0, 2.0], 3);
        assert_eq!(sma, vec![None, None]);
    }

    #[test]
    fn rolling_mean_zero_window_is_exact() {
        let values = [5.0, 0.0, 0.0, 0.0];
        let sma = rolling_mean(&values, 3);
        assert_eq!(sma[3], Some(0.0));
    }

    #[test]
    fn rolling_mean_skips_non_finite_windows() {
        let values = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        let sma = rolling_mean(&values, 2);
        assert_eq!(sma[1], None);
        assert_eq!(sma[2], None);
        assert_eq!(sma[3], Some(3.5));
    }

    #[test]
    fn trailing_mean_uses_last_window() {
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(trailing_mean(&[1.0], 2), None);
        assert_eq!(trailing_mean(&[1.0], 0), None);
    }
}
