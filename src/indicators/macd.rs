// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD_t      = EMA_short(close)_t - EMA_long(close)_t
//   Signal_t    = EMA_signal(MACD)_t        (seeded by MACD_0)
//   Histogram_t = MACD_t - Signal_t
//
// All EMAs use the unadjusted recursive form from `ema.rs`.  Values keep full
// precision here; rounding for display happens in the report layer.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::ema::calculate_ema;

/// Spans for the three EMAs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    pub short_span: usize,
    pub long_span: usize,
    pub signal_span: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            short_span: 12,
            long_span: 26,
            signal_span: 9,
        }
    }
}

/// Full MACD series, one entry per input close.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Latest MACD reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the full MACD / signal / histogram series.
///
/// The early entries are partially warmed; callers that need a trustworthy
/// value should use [`current_macd`], which applies the warm-up rule.
///
/// Returns an empty series for empty input or any zero span.  If a non-finite
/// value appears the series is truncated before it.
pub fn calculate_macd(closes: &[f64], params: MacdParams) -> MacdSeries {
    if params.short_span == 0 || params.long_span == 0 || params.signal_span == 0 {
        return MacdSeries::default();
    }

    let short = calculate_ema(closes, params.short_span);
    let long = calculate_ema(closes, params.long_span);

    let macd: Vec<f64> = short.iter().zip(long.iter()).map(|(s, l)| s - l).collect();
    let signal = calculate_ema(&macd, params.signal_span);

    let len = signal.len();
    let macd = macd[..len].to_vec();
    let histogram = macd.iter().zip(signal.iter()).map(|(m, s)| m - s).collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

/// Most recent MACD reading.
///
/// Returns `None` when fewer than `long_span` closes are available (the long
/// EMA has not warmed up), when any span is zero, or when the series was
/// truncated by a non-finite input.
pub fn current_macd(closes: &[f64], params: MacdParams) -> Option<MacdReading> {
    if closes.len() < params.long_span.max(1) {
        return None;
    }

    let series = calculate_macd(closes, params);
    if series.macd.len() != closes.len() {
        return None;
    }

    Some(MacdReading {
        macd: *series.macd.last()?,
        signal: *series.signal.last()?,
        histogram: *series.histogram.last()?,
    })
}
