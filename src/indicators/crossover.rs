// =============================================================================
// Golden / Death Cross Detector
// =============================================================================
//
// Compares a short trailing SMA (default 50 days) against a long trailing SMA
// (default 200 days) and reports whether the short average crossed the long
// one during the most recent `lookback` transitions.
//
//   GOLDEN: short[t-1] <  long[t-1]  and  short[t] >= long[t]
//   DEATH:  short[t-1] >  long[t-1]  and  short[t] <= long[t]
//
// Transitions are scanned from the latest day backwards; the first match is
// reported, so a reversal inside the window always reports the newest event.
// Transitions where either average is undefined are skipped.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::sma::rolling_mean;

/// Outcome of the crossover scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverLabel {
    GoldenCross,
    DeathCross,
    NoCross,
    /// Not enough history (or invalid windows) to evaluate.
    Unknown,
}

impl std::fmt::Display for CrossoverLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GoldenCross => write!(f, "Golden Cross"),
            Self::DeathCross => write!(f, "Death Cross"),
            Self::NoCross => write!(f, "No Cross"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Window sizes for the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverParams {
    pub short_window: usize,
    pub long_window: usize,
    /// Number of most recent day-to-day transitions to inspect.
    pub lookback: usize,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
            lookback: 5,
        }
    }
}

/// Detect a golden or death cross among the last `params.lookback`
/// transitions of `closes`.
///
/// Returns [`CrossoverLabel::Unknown`] when `closes` holds fewer than
/// `long_window` points or when the windows are degenerate
/// (`short_window == 0` or `short_window >= long_window`).
pub fn detect_crossover(closes: &[f64], params: CrossoverParams) -> CrossoverLabel {
    if params.short_window == 0
        || params.short_window >= params.long_window
        || closes.len() < params.long_window
    {
        return CrossoverLabel::Unknown;
    }

    let short = rolling_mean(closes, params.short_window);
    let long = rolling_mean(closes, params.long_window);

    scan_for_cross(&short, &long, params.lookback)
}

/// Scan the aligned average series backwards for the most recent cross.
fn scan_for_cross(short: &[Option<f64>], long: &[Option<f64>], lookback: usize) -> CrossoverLabel {
    let n = short.len().min(long.len());
    if n < 2 {
        return CrossoverLabel::NoCross;
    }

    let earliest = n.saturating_sub(lookback).max(1);
    for t in (earliest..n).rev() {
        let (Some(prev_short), Some(prev_long), Some(curr_short), Some(curr_long)) =
            (short[t - 1], long[t - 1], short[t], long[t])
        else {
            continue;
        };

        if prev_short < prev_long && curr_short >= curr_long {
            return CrossoverLabel::GoldenCross;
        }
        if prev_short > prev_long && curr_short <= curr_long {
            return CrossoverLabel::DeathCross;
        }
    }

    CrossoverLabel::NoCross
}
