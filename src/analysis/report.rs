// =============================================================================
// Report rows — the flat, ordered table handed to the presentation layer
// =============================================================================

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::analysis::IndicatorResult;
use crate::indicators::round_to;
use crate::market_data::{Fundamentals, PriceSeries};
use crate::types::Cell;

pub const TICKER_COLUMN: &str = "Ticker";

/// Metric columns in display order (the ticker column comes first).
pub const METRIC_COLUMNS: [&str; 22] = [
    "Today's Share Price",
    "Price 1 Month Ago",
    "Price 3 Months Ago",
    "1Y % Price Change",
    "52-Week High",
    "52-Week Low",
    "P/E Ratio",
    "EV/EBITDA",
    "EV/Sales",
    "EBITDA",
    "Operating Margin",
    "Return on Equity (ROE)",
    "Dividend Yield",
    "Beta",
    "Market Cap",
    "RSI (14-day)",
    "MACD",
    "MACD Signal",
    "200D/50D Crossover",
    "EPS Estimate (Next Year)",
    "Earnings Growth (Quarterly)",
    "Analyst Target Price",
];

const ONE_MONTH_DAYS: i64 = 30;
const THREE_MONTHS_DAYS: i64 = 90;
const ONE_YEAR_DAYS: i64 = 365;

/// One ticker's row.  Serialises as a map in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub ticker: String,
    /// One cell per entry of [`METRIC_COLUMNS`].
    pub cells: Vec<Cell>,
    /// Why the row failed, for rows whose cells are all `Error`.
    pub error: Option<String>,
    /// Non-fatal problem behind "N/A" fundamentals columns.
    pub warning: Option<String>,
}

impl ReportRow {
    /// Assemble a row from the fetched history, optional fundamentals and
    /// the indicator readings.
    pub fn build(
        ticker: &str,
        series: &PriceSeries,
        fundamentals: Option<&Fundamentals>,
        indicators: &IndicatorResult,
    ) -> Self {
        let empty = Fundamentals::default();
        let f = fundamentals.unwrap_or(&empty);

        let today = f.current_price.or_else(|| series.last_close());
        let price_1y = series.close_days_before_last(ONE_YEAR_DAYS);
        let year_change = match (today, price_1y) {
            (Some(now), Some(then)) if then != 0.0 => Some((now - then) / then * 100.0),
            _ => None,
        };

        let cells = vec![
            num(today, 2),
            num(series.close_days_before_last(ONE_MONTH_DAYS), 2),
            num(series.close_days_before_last(THREE_MONTHS_DAYS), 2),
            num(year_change, 2),
            num(f.fifty_two_week_high, 2),
            num(f.fifty_two_week_low, 2),
            num(f.pe_ratio(), 2),
            num(f.enterprise_to_ebitda, 2),
            num(f.enterprise_to_revenue, 2),
            num(f.ebitda, 2),
            num(f.operating_margin, 2),
            num(f.return_on_equity, 2),
            num(f.dividend_yield, 4),
            num(f.beta, 2),
            market_cap(f.market_cap),
            num(indicators.rsi, 2),
            num(indicators.macd, 2),
            num(indicators.macd_signal, 2),
            Cell::Text(indicators.crossover.to_string()),
            num(f.forward_eps, 2),
            num(f.earnings_quarterly_growth, 2),
            num(f.target_mean_price, 2),
        ];

        Self {
            ticker: ticker.to_string(),
            cells,
            error: None,
            warning: None,
        }
    }

    /// Row for a ticker that could not be processed.
    pub fn failed(ticker: &str, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            cells: vec![Cell::Error; METRIC_COLUMNS.len()],
            error: Some(reason.into()),
            warning: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Cell for a metric column name.
    #[cfg(test)]
    pub fn get(&self, column: &str) -> Option<&Cell> {
        METRIC_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.cells.get(i))
    }
}

impl Serialize for ReportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(METRIC_COLUMNS.len() + 1))?;
        map.serialize_entry(TICKER_COLUMN, &self.ticker)?;
        for (column, cell) in METRIC_COLUMNS.iter().zip(&self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

fn num(value: Option<f64>, decimals: u32) -> Cell {
    Cell::from_option(value.map(|v| round_to(v, decimals)))
}

fn market_cap(value: Option<f64>) -> Cell {
    match value {
        Some(v) if v.is_finite() => Cell::Text(format!("{:.2}B", v / 1e9)),
        _ => Cell::NotAvailable,
    }
}

/// A failed row's reason, listed next to the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub ticker: String,
    pub reason: String,
}

/// Output of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Whether the run was cut short by the abort signal.
    pub aborted: bool,
    pub columns: Vec<&'static str>,
    /// One row per requested ticker, in request order.
    pub rows: Vec<ReportRow>,
    pub failures: Vec<RowFailure>,
    /// Rows that were reported with degraded (fundamentals-free) data.
    pub warnings: Vec<RowFailure>,
}

impl Report {
    pub fn new(rows: Vec<ReportRow>, aborted: bool) -> Self {
        let failures = rows
            .iter()
            .filter_map(|r| {
                r.error.as_ref().map(|reason| RowFailure {
                    ticker: r.ticker.clone(),
                    reason: reason.clone(),
                })
            })
            .collect();
        let warnings = rows
            .iter()
            .filter_map(|r| {
                r.warning.as_ref().map(|reason| RowFailure {
                    ticker: r.ticker.clone(),
                    reason: reason.clone(),
                })
            })
            .collect();

        let mut columns = Vec::with_capacity(METRIC_COLUMNS.len() + 1);
        columns.push(TICKER_COLUMN);
        columns.extend(METRIC_COLUMNS);

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            aborted,
            columns,
            rows,
            failures,
            warnings,
        }
    }

    /// Number of rows flagged `Error`.
    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_error()).count()
    }

    #[cfg(test)]
    pub fn row(&self, ticker: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.ticker == ticker)
    }

    /// Render the table as CSV, header first.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, self.columns.iter().map(|c| c.to_string()));
        for row in &self.rows {
            let fields = std::iter::once(row.ticker.clone()).chain(row.cells.iter().map(Cell::to_string));
            push_csv_line(&mut out, fields);
        }
        out
    }
}

fn push_csv_line(out: &mut String, fields: impl Iterator<Item = String>) {
    let line: Vec<String> = fields
        .map(|f| {
            if f.contains([',', '"', '\n']) {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                f
            }
        })
        .collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::CrossoverLabel;
    use chrono::NaiveDate;

    fn daily_series(start: NaiveDate, closes: &[f64]) -> PriceSeries {
        PriceSeries::from_closes(start, closes).unwrap()
    }

    fn readings() -> IndicatorResult {
        IndicatorResult {
            rsi: Some(46.765498),
            macd: Some(0.024876),
            macd_signal: Some(-0.004),
            macd_histogram: Some(0.028876),
            crossover: CrossoverLabel::GoldenCross,
        }
    }

    #[test]
    fn row_uses_fundamentals_and_history() {
        // 400 consecutive days, close == day index + 1.
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let closes: Vec<f64> = (1..=400).map(f64::from).collect();
        let series = daily_series(start, &closes);

        let fundamentals = Fundamentals {
            current_price: Some(412.346),
            trailing_pe: None,
            forward_pe: Some(25.456),
            dividend_yield: Some(0.005234),
            market_cap: Some(2_950_000_000_000.0),
            ..Fundamentals::default()
        };

        let row = ReportRow::build("AAPL", &series, Some(&fundamentals), &readings());

        assert_eq!(row.get("Today's Share Price"), Some(&Cell::Number(412.35)));
        assert_eq!(row.get("Price 1 Month Ago"), Some(&Cell::Number(370.0)));
        assert_eq!(row.get("Price 3 Months Ago"), Some(&Cell::Number(310.0)));
        // price 1y ago = 35.0 -> (412.346 - 35) / 35 * 100
        assert_eq!(row.get("1Y % Price Change"), Some(&Cell::Number(1078.13)));
        assert_eq!(row.get("P/E Ratio"), Some(&Cell::Number(25.46)));
        assert_eq!(row.get("Dividend Yield"), Some(&Cell::Number(0.0052)));
        assert_eq!(row.get("Market Cap"), Some(&Cell::Text("2950.00B".into())));
        assert_eq!(row.get("RSI (14-day)"), Some(&Cell::Number(46.77)));
        assert_eq!(row.get("MACD"), Some(&Cell::Number(0.02)));
        assert_eq!(row.get("MACD Signal"), Some(&Cell::Number(0.0)));
        assert_eq!(
            row.get("200D/50D Crossover"),
            Some(&Cell::Text("Golden Cross".into()))
        );
        assert_eq!(row.get("Beta"), Some(&Cell::NotAvailable));
        assert!(!row.is_error());
    }

    #[test]
    fn row_without_fundamentals_falls_back_to_last_close() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = daily_series(start, &[10.0, 11.0, 12.5]);
        let row = ReportRow::build("MSFT", &series, None, &IndicatorResult::unknown());

        assert_eq!(row.get("Today's Share Price"), Some(&Cell::Number(12.5)));
        // Series is shorter than a month: the earliest close is used.
        assert_eq!(row.get("Price 1 Month Ago"), Some(&Cell::Number(10.0)));
        assert_eq!(row.get("P/E Ratio"), Some(&Cell::NotAvailable));
        assert_eq!(row.get("Market Cap"), Some(&Cell::NotAvailable));
        assert_eq!(row.get("RSI (14-day)"), Some(&Cell::NotAvailable));
        assert_eq!(row.get("200D/50D Crossover"), Some(&Cell::Text("Unknown".into())));
    }

    #[test]
    fn failed_row_is_error_everywhere() {
        let row = ReportRow::failed("ZZZZ", "ticker ZZZZ not found");
        assert!(row.is_error());
        assert_eq!(row.cells.len(), METRIC_COLUMNS.len());
        assert!(row.cells.iter().all(Cell::is_error));
    }

    #[test]
    fn row_serialises_in_column_order() {
        let row = ReportRow::failed("ZZZZ", "boom");
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.starts_with(r#"{"Ticker":"ZZZZ","Today's Share Price":"Error""#));
        assert!(json.ends_with(r#""Analyst Target Price":"Error"}"#));
    }

    #[test]
    fn report_counts_errors() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = daily_series(start, &[10.0, 11.0]);
        let rows = vec![
            ReportRow::build("AAPL", &series, None, &IndicatorResult::unknown()),
            ReportRow::failed("ZZZZ", "not found"),
        ];
        let report = Report::new(rows, false);
        assert!(report.warnings.is_empty());

        assert_eq!(report.error_count(), 1);
        assert_eq!(report.columns.len(), 23);
        assert_eq!(report.columns[0], "Ticker");
        assert_eq!(
            report.failures,
            vec![RowFailure {
                ticker: "ZZZZ".into(),
                reason: "not found".into()
            }]
        );
        assert!(report.row("AAPL").is_some());
    }

    #[test]
    fn degraded_rows_are_listed_as_warnings() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = daily_series(start, &[10.0, 11.0]);
        let mut row = ReportRow::build("AAPL", &series, None, &IndicatorResult::unknown());
        row.warning = Some("fundamentals unavailable: provider refused access: Invalid Crumb".into());

        let report = Report::new(vec![row], false);
        assert_eq!(report.error_count(), 0);
        assert!(report.failures.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].ticker, "AAPL");
        assert!(report.warnings[0].reason.contains("Invalid Crumb"));
    }

    #[test]
    fn csv_export_quotes_and_orders_columns() {
        let report = Report::new(vec![ReportRow::failed("ZZZZ", "boom")], false);
        let csv = report.to_csv();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("Ticker,Today's Share Price,"));
        assert!(header.contains(",RSI (14-day),"));
        assert_eq!(header.split(',').count(), 23);

        let row = lines.next().unwrap();
        assert!(row.starts_with("ZZZZ,Error,Error"));
        assert_eq!(lines.next(), None);
    }
}
