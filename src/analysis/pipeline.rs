// =============================================================================
// Batch pipeline — fetch, evaluate and tabulate every ticker
// =============================================================================
//
// Tickers are processed concurrently (bounded by `fetch.concurrency`) through
// an order-preserving buffered stream, so the report lists rows in request
// order whatever the completion order.  A ticker's failure only ever turns
// its own row into an `Error` row.
// =============================================================================

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::analysis::{IndicatorResult, Report, ReportRow};
use crate::provider::{with_retry, FundamentalsFeed, PriceFeed, RetryPolicy};
use crate::runtime_config::{IndicatorParams, RuntimeConfig};
use crate::types::AbortSignal;

pub const ABORTED_REASON: &str = "aborted";

/// Run one analysis pass over `tickers`.
pub async fn run_batch(
    price_feed: &dyn PriceFeed,
    fundamentals_feed: Option<&dyn FundamentalsFeed>,
    tickers: &[String],
    config: &RuntimeConfig,
    abort: &AbortSignal,
) -> Report {
    let concurrency = config.fetch.concurrency.max(1);
    let policy = config.fetch.retry_policy();
    let lookback = config.fetch.lookback();

    info!(tickers = tickers.len(), concurrency, "analysis run started");

    let ctx = TickerContext {
        price_feed,
        fundamentals_feed,
        params: &config.indicators,
        policy: &policy,
        lookback,
        abort,
    };

    // Owned tickers keep the stream future free of higher-ranked borrows so
    // callers can hand it to `tokio::spawn`.
    let ctx = &ctx;
    let rows: Vec<ReportRow> = stream::iter(tickers.iter().cloned())
        .map(move |ticker| async move { ctx.process(&ticker).await })
        .buffered(concurrency)
        .collect()
        .await;

    let report = Report::new(rows, abort.is_aborted());
    info!(
        run_id = %report.run_id,
        rows = report.rows.len(),
        errors = report.error_count(),
        aborted = report.aborted,
        "analysis run finished"
    );
    report
}

struct TickerContext<'a> {
    price_feed: &'a dyn PriceFeed,
    fundamentals_feed: Option<&'a dyn FundamentalsFeed>,
    params: &'a IndicatorParams,
    policy: &'a RetryPolicy,
    lookback: chrono::Duration,
    abort: &'a AbortSignal,
}

impl TickerContext<'_> {
    async fn process(&self, ticker: &str) -> ReportRow {
        if self.abort.is_aborted() {
            debug!(ticker, "skipped, run aborted");
            return ReportRow::failed(ticker, ABORTED_REASON);
        }

        let history = with_retry(ticker, "history", self.policy, self.abort, || {
            self.price_feed.fetch_history(ticker, self.lookback)
        });
        let fundamentals = async {
            match self.fundamentals_feed {
                Some(feed) => Some(
                    with_retry(ticker, "fundamentals", self.policy, self.abort, || {
                        feed.fetch_fundamentals(ticker)
                    })
                    .await,
                ),
                None => None,
            }
        };
        let (history, fundamentals) = tokio::join!(history, fundamentals);

        let series = match history {
            Ok(series) => series,
            Err(err) => {
                warn!(ticker, error = %err, "history fetch failed");
                return ReportRow::failed(ticker, err.to_string());
            }
        };

        let (fundamentals, warning) = match fundamentals {
            Some(Ok(f)) => (Some(f), None),
            Some(Err(err)) => {
                warn!(ticker, error = %err, "fundamentals unavailable");
                (None, Some(format!("fundamentals unavailable: {err}")))
            }
            None => (None, None),
        };

        let indicators = IndicatorResult::evaluate(&series, self.params);
        debug!(
            ticker,
            bars = series.len(),
            rsi = ?indicators.rsi,
            zone = ?indicators.rsi_zone(),
            macd = ?indicators.macd,
            crossover = %indicators.crossover,
            "indicators evaluated"
        );

        let mut row = ReportRow::build(ticker, &series, fundamentals.as_ref(), &indicators);
        row.warning = warning;
        row
    }
}
