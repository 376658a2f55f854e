// =============================================================================
// Relative Strength Index (RSI) — simple trailing averages
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether a stock is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Split each delta into a gain (positive part) and a loss (magnitude
//          of the negative part).
// Step 3 — Average gain / average loss = simple mean over the trailing
//          `period` deltas.  The average at day t only uses days
//          [t - period + 1, t], so there is no look-ahead.
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Zero-division: avg_loss == 0 with avg_gain > 0 saturates to 100; both zero
// (a flat window) has no defined RSI and yields `None`.
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::sma::{rolling_mean, trailing_mean};

/// Compute the full RSI series for `closes`, aligned index-for-index with the
/// input.
///
/// Entry `t` is `None` while fewer than `period` deltas are available
/// (`t < period`) and wherever the window is flat.
///
/// # Edge cases
/// - `period == 0` => every entry is `None`
/// - `closes.len() < period + 1` => every entry is `None`
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return result;
    }

    let (gains, losses) = gains_and_losses(closes);
    let avg_gains = rolling_mean(&gains, period);
    let avg_losses = rolling_mean(&losses, period);

    // Delta index i describes the move into close index i + 1.
    for (i, (g, l)) in avg_gains.iter().zip(avg_losses.iter()).enumerate() {
        if let (Some(g), Some(l)) = (g, l) {
            result[i + 1] = rsi_from_averages(*g, *l);
        }
    }

    result
}

/// Most recent RSI value, or `None` when there is insufficient history or the
/// latest window is flat.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let tail = &closes[closes.len() - (period + 1)..];
    let (gains, losses) = gains_and_losses(tail);
    let avg_gain = trailing_mean(&gains, period)?;
    let avg_loss = trailing_mean(&losses, period)?;

    rsi_from_averages(avg_gain, avg_loss)
}

/// Coarse momentum zone for an RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Overbought,
    Neutral,
    Oversold,
}

impl RsiZone {
    pub fn classify(rsi: f64) -> Self {
        if rsi >= 70.0 {
            Self::Overbought
        } else if rsi <= 30.0 {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Oversold => write!(f, "OVERSOLD"),
        }
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn gains_and_losses(closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
    closes
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - Both averages zero => `None` (0 / 0 is undefined).
/// - Average loss zero => 100.0.
/// - Non-finite result => `None`.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        return None;
    }

    let rsi = if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    rsi.is_finite().then(|| rsi.clamp(0.0, 100.0))
}
