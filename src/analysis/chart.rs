// =============================================================================
// Chart series — full indicator history for one ticker
// =============================================================================
//
// Where the report carries only the latest reading, the chart carries every
// session so a client can plot price, the two moving averages, RSI and MACD.
// All vectors are aligned index-for-index with `dates`; `null` marks a
// session where the indicator is not yet defined.
// =============================================================================

use chrono::NaiveDate;
use serde::Serialize;

use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::sma::rolling_mean;
use crate::indicators::{detect_crossover, round_to, CrossoverLabel};
use crate::market_data::PriceSeries;
use crate::runtime_config::IndicatorParams;

const DECIMALS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
    pub sma_short: Vec<Option<f64>>,
    pub sma_long: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub crossover: CrossoverLabel,
}

impl ChartSeries {
    /// Build the chart for `series`, or `None` when it holds no bars.
    pub fn build(ticker: &str, series: &PriceSeries, params: &IndicatorParams) -> Option<Self> {
        if series.is_empty() {
            return None;
        }

        let bars = series.bars();
        let closes = series.closes();
        let n = closes.len();

        // MACD entries are only reported once the long EMA has warmed up.
        let macd = calculate_macd(&closes, params.macd);
        let warm_from = params.macd.long_span.max(1) - 1;
        let warmed = |values: &[f64]| -> Vec<Option<f64>> {
            (0..n)
                .map(|i| {
                    values
                        .get(i)
                        .filter(|_| i >= warm_from)
                        .map(|v| round_to(*v, DECIMALS))
                })
                .collect()
        };

        Some(Self {
            ticker: ticker.to_string(),
            dates: bars.iter().map(|b| b.date).collect(),
            sma_short: rounded(rolling_mean(&closes, params.crossover.short_window)),
            sma_long: rounded(rolling_mean(&closes, params.crossover.long_window)),
            rsi: rounded(calculate_rsi(&closes, params.rsi_period)),
            macd: warmed(&macd.macd),
            macd_signal: warmed(&macd.signal),
            macd_histogram: warmed(&macd.histogram),
            crossover: detect_crossover(&closes, params.crossover),
            closes,
        })
    }
}

fn rounded(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| v.map(|x| round_to(x, DECIMALS)))
        .collect()
}
