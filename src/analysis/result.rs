use serde::Serialize;

use crate::indicators::rsi::RsiZone;
use crate::indicators::{current_macd, current_rsi, detect_crossover, CrossoverLabel};
use crate::market_data::PriceSeries;
use crate::runtime_config::IndicatorParams;

/// Indicator readings for one ticker at the latest session.
///
/// Every value is `None` when the series is too short or the calculation is
/// undefined, never NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub crossover: CrossoverLabel,
}

impl IndicatorResult {
    /// Run all three calculators over the same closes.
    pub fn evaluate(series: &PriceSeries, params: &IndicatorParams) -> Self {
        let closes = series.closes();
        let macd = current_macd(&closes, params.macd);

        Self {
            rsi: current_rsi(&closes, params.rsi_period),
            macd: macd.map(|m| m.macd),
            macd_signal: macd.map(|m| m.signal),
            macd_histogram: macd.map(|m| m.histogram),
            crossover: detect_crossover(&closes, params.crossover),
        }
    }

    /// Result for a ticker whose history could not be obtained.
    #[cfg(test)]
    pub fn unknown() -> Self {
        Self {
            rsi: None,
            macd: None,
            macd_signal: None,
            macd_histogram: None,
            crossover: CrossoverLabel::Unknown,
        }
    }

    pub fn rsi_zone(&self) -> Option<RsiZone> {
        self.rsi.map(RsiZone::classify)
    }
}
