// =============================================================================
// Central Application State — StockScope
// =============================================================================
//
// The single source of truth for the service.  The refresh loop writes the
// latest report here; the REST API reads it and pokes the loop through the
// refresh trigger and the abort signal.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared values.
//   - Feeds are `Arc<dyn ...>` trait objects shared with every run.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::analysis::{run_batch, Report};
use crate::provider::{FundamentalsFeed, PriceFeed, RateLimitSnapshot, RateLimitTracker};
use crate::runtime_config::RuntimeConfig;
use crate::types::{AbortSignal, RunStatus};
use crate::watchlist::WatchlistStore;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Ticker the error belongs to, if any.
    pub ticker: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Incremented on every meaningful state mutation.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Providers ───────────────────────────────────────────────────────
    pub price_feed: Arc<dyn PriceFeed>,
    pub fundamentals_feed: Option<Arc<dyn FundamentalsFeed>>,
    pub rate_limit: Arc<RateLimitTracker>,

    // ── Watch-list ──────────────────────────────────────────────────────
    pub watchlist: WatchlistStore,
    pub tickers: RwLock<Vec<String>>,

    // ── Runs ────────────────────────────────────────────────────────────
    pub latest_report: RwLock<Option<Arc<Report>>>,
    pub run_status: RwLock<RunStatus>,
    pub abort: AbortSignal,
    pub refresh_trigger: Notify,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Bearer token for mutating endpoints; `None` disables them.
    pub admin_token: Option<String>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        price_feed: Arc<dyn PriceFeed>,
        fundamentals_feed: Option<Arc<dyn FundamentalsFeed>>,
        rate_limit: Arc<RateLimitTracker>,
        watchlist: WatchlistStore,
        tickers: Vec<String>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            price_feed,
            fundamentals_feed,
            rate_limit,
            watchlist,
            tickers: RwLock::new(tickers),
            latest_report: RwLock::new(None),
            run_status: RwLock::new(RunStatus::Idle),
            abort: AbortSignal::new(),
            refresh_trigger: Notify::new(),
            recent_errors: RwLock::new(Vec::new()),
            admin_token: admin_token.filter(|t| !t.is_empty()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message; oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, msg: String, ticker: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            ticker,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Runs ────────────────────────────────────────────────────────────

    /// Run one batch over the current watch-list and publish the report.
    pub async fn run_once(&self) -> Arc<Report> {
        let config = self.runtime_config.read().clone();
        let tickers = self.tickers.read().clone();

        self.abort.reset();
        *self.run_status.write() = RunStatus::Running;
        self.increment_version();

        let report = run_batch(
            self.price_feed.as_ref(),
            self.fundamentals_feed.as_deref(),
            &tickers,
            &config,
            &self.abort,
        )
        .await;

        for failure in report.failures.iter().chain(&report.warnings) {
            self.push_error(failure.reason.clone(), Some(failure.ticker.clone()));
        }

        let report = Arc::new(report);
        *self.latest_report.write() = Some(Arc::clone(&report));
        *self.run_status.write() = RunStatus::Idle;
        self.increment_version();
        report
    }

    /// Ask the refresh loop to start a run now.
    pub fn request_refresh(&self) {
        self.refresh_trigger.notify_one();
    }

    /// Raise the abort signal.  Returns whether a run was in flight.
    pub fn request_abort(&self) -> bool {
        let mut status = self.run_status.write();
        if *status != RunStatus::Running {
            return false;
        }
        *status = RunStatus::Aborting;
        drop(status);

        self.abort.abort();
        warn!("analysis run abort requested");
        self.increment_version();
        true
    }

    /// Replace the watch-list, persisting it first.  Returns the normalised
    /// list that is now active.
    pub fn set_tickers(&self, tickers: &[String]) -> Result<Vec<String>> {
        let saved = self.watchlist.save(tickers)?;
        *self.tickers.write() = saved.clone();
        info!(tickers = ?saved, "watch-list updated");
        self.increment_version();
        Ok(saved)
    }

    pub fn latest_report(&self) -> Option<Arc<Report>> {
        self.latest_report.read().clone()
    }

    pub fn health(&self) -> HealthSnapshot {
        let report = self.latest_report.read();
        HealthSnapshot {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            state_version: self.current_state_version(),
            run_status: *self.run_status.read(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            last_run_at: report.as_ref().map(|r| r.generated_at.to_rfc3339()),
            last_run_errors: report.as_ref().map(|r| r.error_count()),
            rate_limit: self.rate_limit.snapshot(),
        }
    }
}

/// Payload of `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub version: &'static str,
    pub state_version: u64,
    pub run_status: RunStatus,
    pub uptime_secs: u64,
    pub last_run_at: Option<String>,
    pub last_run_errors: Option<usize>,
    pub rate_limit: RateLimitSnapshot,
}
