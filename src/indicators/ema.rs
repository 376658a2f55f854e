// =============================================================================
// Exponential Moving Average (EMA) — unadjusted recursive form
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   alpha  = 2 / (span + 1)
//   EMA_0  = value_0
//   EMA_t  = alpha * value_t + (1 - alpha) * EMA_{t-1}
//
// No finite-sample bias correction is applied.  The recursion is evaluated as
// EMA_{t-1} + alpha * (value_t - EMA_{t-1}), which is algebraically identical
// and keeps a constant input exactly constant.
// =============================================================================

/// Smoothing factor for a given span.
pub fn alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Compute the EMA series for `values` with the given `span`.
///
/// The output has one entry per input value; the first entry equals the first
/// input.
///
/// # Edge cases
/// - `span == 0` => empty vec
/// - empty input => empty vec
/// - A non-finite intermediate value truncates the series at that point so
///   downstream consumers never read a poisoned value.
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let a = alpha(span);
    let mut result = Vec::with_capacity(values.len());

    let mut prev = values[0];
    if !prev.is_finite() {
        return result;
    }
    result.push(prev);

    for &value in &values[1..] {
        let ema = prev + a * (value - prev);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev = ema;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_span_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_seeded_with_first_value() {
        let ema = calculate_ema(&[7.0], 12);
        assert_eq!(ema, vec![7.0]);
    }

    #[test]
    fn ema_known_values() {
        // span 3 => alpha 0.5
        let ema = calculate_ema(&[2.0, 4.0, 8.0], 3);
        assert_eq!(ema.len(), 3);
        assert!((ema[0] - 2.0).abs() < 1e-12);
        assert!((ema[1] - 3.0).abs() < 1e-12);
        assert!((ema[2] - 5.5).abs() < 1e-12);
    }

    #[test]
    fn ema_matches_textbook_recursion() {
        let values: Vec<f64> = (1..=20).map(|x| (x as f64).sqrt() * 10.0).collect();
        let ema = calculate_ema(&values, 5);
        let a = 2.0 / 6.0;
        let mut expected = values[0];
        for (i, &v) in values.iter().enumerate().skip(1) {
            expected = a * v + (1.0 - a) * expected;
            assert!((ema[i] - expected).abs() < 1e-10, "index {i}");
        }
    }

    #[test]
    fn ema_constant_input_stays_constant() {
        let ema = calculate_ema(&[101.37; 50], 26);
        assert!(ema.iter().all(|&v| v == 101.37));
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let ema = calculate_ema(&[1.0, 2.0, f64::NAN, 4.0], 3);
        assert_eq!(ema.len(), 2);
    }
}
