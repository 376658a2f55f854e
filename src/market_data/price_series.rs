use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One trading day of OHLCV data as delivered by the price feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
impl DailyBar {
    /// A bar where only the close is known; OHLC collapse onto the close.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Violations of the [`PriceSeries`] ordering invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceSeriesError {
    #[error("bar {index} ({date}) is not after the previous bar ({previous})")]
    OutOfOrder {
        index: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },
    #[error("bar {index} ({date}) has a non-finite close")]
    NonFiniteClose { index: usize, date: NaiveDate },
}

// ---------------------------------------------------------------------------
// PriceSeries -- immutable, strictly date-ordered daily bars
// ---------------------------------------------------------------------------

/// Chronologically ordered daily bars for a single ticker.
///
/// Dates are strictly increasing (no duplicates) and every close is finite.
/// The series is read-only once built; all indicators borrow its closes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceSeries {
    bars: Vec<DailyBar>,
}

impl PriceSeries {
    /// Build a series, validating ordering and finiteness.
    pub fn new(bars: Vec<DailyBar>) -> Result<Self, PriceSeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() {
                return Err(PriceSeriesError::NonFiniteClose {
                    index,
                    date: bar.date,
                });
            }
            if index > 0 {
                let previous = bars[index - 1].date;
                if bar.date <= previous {
                    return Err(PriceSeriesError::OutOfOrder {
                        index,
                        date: bar.date,
                        previous,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    /// Build a series of consecutive calendar days starting at `start`.
    #[cfg(test)]
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self, PriceSeriesError> {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar::from_close(start + Duration::days(i as i64), close))
            .collect();
        Self::new(bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.last().map(|b| b.close)
    }

    /// Close of the first bar dated on or after `date`.
    pub fn close_on_or_after(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.bars.partition_point(|b| b.date < date);
        self.bars.get(idx).map(|b| b.close)
    }

    /// Close of the first bar on or after `days` calendar days before the
    /// latest bar, i.e. the opening close of a `days`-long trailing window.
    pub fn close_days_before_last(&self, days: i64) -> Option<f64> {
        let last = self.last()?;
        self.close_on_or_after(last.date - Duration::days(days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_out_of_order_dates() {
        let bars = vec![
            DailyBar::from_close(day(2024, 1, 3), 10.0),
            DailyBar::from_close(day(2024, 1, 2), 11.0),
        ];
        let err = PriceSeries::new(bars).unwrap_err();
        assert!(matches!(err, PriceSeriesError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let bars = vec![
            DailyBar::from_close(day(2024, 1, 2), 10.0),
            DailyBar::from_close(day(2024, 1, 2), 11.0),
        ];
        assert!(PriceSeries::new(bars).is_err());
    }

    #[test]
    fn rejects_non_finite_close() {
        let bars = vec![DailyBar::from_close(day(2024, 1, 2), f64::NAN)];
        assert!(matches!(
            PriceSeries::new(bars),
            Err(PriceSeriesError::NonFiniteClose { index: 0, .. })
        ));
    }

    #[test]
    fn empty_series_is_valid() {
        let series = PriceSeries::new(Vec::new()).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.last_close(), None);
        assert_eq!(series.close_days_before_last(30), None);
    }

    #[test]
    fn closes_are_oldest_first() {
        let series = PriceSeries::from_closes(day(2024, 1, 1), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.last().map(|b| b.date), Some(day(2024, 1, 3)));
    }

    #[test]
    fn close_lookup_skips_gaps() {
        let bars = vec![
            DailyBar::from_close(day(2024, 1, 2), 10.0),
            DailyBar::from_close(day(2024, 1, 5), 11.0),
            DailyBar::from_close(day(2024, 2, 5), 12.0),
        ];
        let series = PriceSeries::new(bars).unwrap();
        assert_eq!(series.close_on_or_after(day(2024, 1, 3)), Some(11.0));
        assert_eq!(series.close_on_or_after(day(2024, 3, 1)), None);
        // 2024-02-05 minus 30 days = 2024-01-06 => first bar on/after is 02-05.
        assert_eq!(series.close_days_before_last(30), Some(12.0));
        // Further back than the series reaches => earliest close.
        assert_eq!(series.close_days_before_last(365), Some(10.0));
    }
}
