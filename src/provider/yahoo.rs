// =============================================================================
// Yahoo Finance REST Client — daily history and fundamentals
// =============================================================================
//
// History comes from the chart endpoint, fundamentals from quote-summary.
// HTTP status codes are mapped onto `FetchError` so the retry layer can tell
// transient failures (429, 5xx, transport) from definitive ones (401/403,
// 404).  Ticker symbols always travel as an escaped path segment.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::market_data::{DailyBar, Fundamentals, PriceSeries};
use crate::provider::rate_limit::RateLimitTracker;
use crate::provider::{FetchError, FundamentalsFeed, PriceFeed};

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";
const SUMMARY_BASE_URL: &str = "https://query2.finance.yahoo.com";
const CONSENT_URL: &str = "https://fc.yahoo.com";
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stockscope/1.0)";

// -----------------------------------------------------------------------------
// Wire types (chart endpoint)
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// Yahoo Finance client implementing both feed traits.
///
/// Quote-summary requests need a session cookie plus a matching crumb.  The
/// crumb is fetched lazily, cached, and renewed once when the provider
/// rejects it.
#[derive(Clone)]
pub struct YahooClient {
    chart_base_url: Url,
    summary_base_url: Url,
    consent_url: Url,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
    crumb: Arc<Mutex<Option<String>>>,
}

impl YahooClient {
    /// Create a client whose HTTP requests give up after `request_timeout`.
    pub fn new(request_timeout: Duration, rate_limit: Arc<RateLimitTracker>) -> Result<Self> {
        Self::with_endpoints(
            CHART_BASE_URL,
            SUMMARY_BASE_URL,
            CONSENT_URL,
            request_timeout,
            rate_limit,
        )
    }

    /// Create a client against explicit endpoints.
    pub fn with_endpoints(
        chart_base_url: &str,
        summary_base_url: &str,
        consent_url: &str,
        request_timeout: Duration,
        rate_limit: Arc<RateLimitTracker>,
    ) -> Result<Self> {
        let parse = |raw: &str| Url::parse(raw).with_context(|| format!("invalid endpoint url {raw}"));
        let chart_base_url = parse(chart_base_url)?;
        let summary_base_url = parse(summary_base_url)?;
        let consent_url = parse(consent_url)?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .cookie_store(true)
            .build()
            .context("failed to build reqwest client")?;

        debug!(chart = %chart_base_url, summary = %summary_base_url, "YahooClient initialised");

        Ok(Self {
            chart_base_url,
            summary_base_url,
            consent_url,
            client,
            rate_limit,
            crumb: Arc::new(Mutex::new(None)),
        })
    }

    /// Issue a GET and map throttling / status failures onto `FetchError`.
    async fn get_text(&self, ticker: &str, url: Url) -> Result<(StatusCode, String), FetchError> {
        if !self.rate_limit.try_acquire() {
            return Err(FetchError::CoolingDown {
                remaining: self.rate_limit.cooldown_remaining().unwrap_or_default(),
            });
        }

        let resp = self.client.get(url).send().await?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let hint = RateLimitTracker::retry_after_from_headers(resp.headers());
            self.rate_limit.record_rate_limited(hint);
            return Err(FetchError::RateLimited {
                retry_after: self.rate_limit.cooldown_remaining().or(hint),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::NetworkError(format!("provider returned {status}")));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(format!("provider returned {status}")));
        }

        let body = resp.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(ticker.to_string()));
        }
        Ok((status, body))
    }

    /// Cached crumb, or a fresh one from the provider.
    async fn crumb(&self, ticker: &str) -> Result<String, FetchError> {
        let cached = self.crumb.lock().clone();
        if let Some(crumb) = cached {
            return Ok(crumb);
        }

        // Only the session cookie matters here; the page itself may 404.
        if let Err(e) = self.client.get(self.consent_url.clone()).send().await {
            debug!(error = %e, "consent page request failed");
        }

        let url = endpoint_url(&self.summary_base_url, &["v1", "test", "getcrumb"], &[])?;
        let (_, body) = self.get_text(ticker, url).await?;
        let crumb = body.trim();
        if crumb.is_empty() || crumb.contains(char::is_whitespace) || crumb.starts_with(['<', '{']) {
            return Err(FetchError::Unauthorized("provider issued no crumb".into()));
        }

        debug!("crumb obtained");
        *self.crumb.lock() = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    async fn fetch_summary(&self, ticker: &str) -> Result<Fundamentals, FetchError> {
        let crumb = self.crumb(ticker).await?;
        let url = endpoint_url(
            &self.summary_base_url,
            &["v10", "finance", "quoteSummary", ticker],
            &[("modules", SUMMARY_MODULES), ("crumb", crumb.as_str())],
        )?;

        let (_, body) = self.get_text(ticker, url).await?;
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        parse_quote_summary(ticker, &value)
    }
}

/// Append `segments` to `base` (each one percent-encoded) and set `query`.
fn endpoint_url(base: &Url, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, FetchError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FetchError::Malformed(format!("{base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

#[async_trait]
impl PriceFeed for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_history")]
    async fn fetch_history(
        &self,
        ticker: &str,
        lookback: chrono::Duration,
    ) -> Result<PriceSeries, FetchError> {
        let end = Utc::now();
        let start = end - lookback;
        let (period1, period2) = (start.timestamp().to_string(), end.timestamp().to_string());
        let url = endpoint_url(
            &self.chart_base_url,
            &["v8", "finance", "chart", ticker],
            &[
                ("interval", "1d"),
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("events", "history"),
            ],
        )?;

        let (status, body) = self.get_text(ticker, url).await?;
        if !status.is_success() {
            warn!(ticker, %status, "unexpected chart status");
        }

        let series = parse_chart(ticker, &body)?;
        debug!(ticker, bars = series.len(), "daily history fetched");
        Ok(series)
    }
}

#[async_trait]
impl FundamentalsFeed for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_fundamentals")]
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FetchError> {
        let fundamentals = match self.fetch_summary(ticker).await {
            Err(FetchError::Unauthorized(reason)) => {
                debug!(ticker, %reason, "crumb rejected, renewing session");
                self.crumb.lock().take();
                self.fetch_summary(ticker).await?
            }
            other => other?,
        };
        debug!(ticker, "fundamentals fetched");
        Ok(fundamentals)
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("chart_base_url", &self.chart_base_url.as_str())
            .field("summary_base_url", &self.summary_base_url.as_str())
            .field("has_crumb", &self.crumb.lock().is_some())
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

/// Decode a chart payload into a validated [`PriceSeries`].
///
/// Bars without a close are dropped.  When two bars land on the same exchange
/// date (Yahoo appends the live session) the later one wins.
fn parse_chart(ticker: &str, body: &str) -> Result<PriceSeries, FetchError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if let Some(err) = response.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(FetchError::NotFound(ticker.to_string()));
        }
        return Err(FetchError::Malformed(format!("{}: {}", err.code, err.description)));
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::Empty(ticker.to_string()))?;

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let offset = data.meta.gmtoffset;

    let mut bars: Vec<DailyBar> = Vec::with_capacity(data.timestamp.len());
    for (i, &ts) in data.timestamp.iter().enumerate() {
        let Some(close) = quote.close.get(i).copied().flatten() else {
            continue;
        };
        if !close.is_finite() {
            continue;
        }
        let Some(date) = exchange_date(ts, offset) else {
            continue;
        };

        let pick = |v: &Vec<Option<f64>>| v.get(i).copied().flatten().unwrap_or(close);
        let bar = DailyBar {
            date,
            open: pick(&quote.open),
            high: pick(&quote.high),
            low: pick(&quote.low),
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
        };

        match bars.last() {
            Some(prev) if prev.date == bar.date => {
                bars.pop();
                bars.push(bar);
            }
            Some(prev) if prev.date > bar.date => continue,
            _ => bars.push(bar),
        }
    }

    if bars.is_empty() {
        return Err(FetchError::Empty(ticker.to_string()));
    }

    PriceSeries::new(bars).map_err(|e| FetchError::Malformed(e.to_string()))
}

fn exchange_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Decode a quote-summary payload.  Each metric is an object with a `raw`
/// number (or an empty object when the provider has no value).
fn parse_quote_summary(ticker: &str, value: &serde_json::Value) -> Result<Fundamentals, FetchError> {
    // Session failures come back under `finance` instead of `quoteSummary`.
    for error in [&value["finance"]["error"], &value["quoteSummary"]["error"]] {
        let Some(code) = error["code"].as_str() else {
            continue;
        };
        let description = error["description"].as_str().unwrap_or(code);
        if code.eq_ignore_ascii_case("Not Found") {
            return Err(FetchError::NotFound(ticker.to_string()));
        }
        if code.eq_ignore_ascii_case("Unauthorized") {
            return Err(FetchError::Unauthorized(description.to_string()));
        }
        return Err(FetchError::Malformed(format!("{code}: {description}")));
    }

    let summary = &value["quoteSummary"];

    let result = summary["result"]
        .as_array()
        .and_then(|r| r.first())
        .ok_or_else(|| FetchError::Empty(ticker.to_string()))?;

    let raw = |module: &str, field: &str| -> Option<f64> {
        let node = &result[module][field];
        node["raw"].as_f64().or_else(|| node.as_f64()).filter(|v| v.is_finite())
    };

    Ok(Fundamentals {
        current_price: raw("financialData", "currentPrice")
            .or_else(|| raw("price", "regularMarketPrice")),
        fifty_two_week_high: raw("summaryDetail", "fiftyTwoWeekHigh"),
        fifty_two_week_low: raw("summaryDetail", "fiftyTwoWeekLow"),
        trailing_pe: raw("summaryDetail", "trailingPE"),
        forward_pe: raw("summaryDetail", "forwardPE"),
        enterprise_to_ebitda: raw("defaultKeyStatistics", "enterpriseToEbitda"),
        enterprise_to_revenue: raw("defaultKeyStatistics", "enterpriseToRevenue"),
        ebitda: raw("financialData", "ebitda"),
        operating_margin: raw("financialData", "operatingMargins"),
        return_on_equity: raw("financialData", "returnOnEquity"),
        dividend_yield: raw("summaryDetail", "dividendYield"),
        beta: raw("summaryDetail", "beta"),
        market_cap: raw("summaryDetail", "marketCap").or_else(|| raw("price", "marketCap")),
        forward_eps: raw("defaultKeyStatistics", "forwardEps"),
        earnings_quarterly_growth: raw("defaultKeyStatistics", "earningsQuarterlyGrowth"),
        target_mean_price: raw("financialData", "targetMeanPrice"),
    })
}
