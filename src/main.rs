// =============================================================================
// StockScope — Main Entry Point
// =============================================================================
//
// Loads configuration, resolves the watch-list, then runs the analysis
// refresh loop next to the REST API until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod indicators;
mod market_data;
mod provider;
mod runtime_config;
mod types;
mod watchlist;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::auth::ENV_ADMIN_TOKEN;
use crate::app_state::AppState;
use crate::provider::{FundamentalsFeed, PriceFeed, RateLimitTracker, YahooClient};
use crate::runtime_config::RuntimeConfig;
use crate::watchlist::{normalise_symbols, WatchlistStore};

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "StockScope starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    // ── 2. Resolve tickers: watch-list file, then env/config ─────────────
    let watchlist = WatchlistStore::new(&config.watchlist_path);
    let tickers = match watchlist.load() {
        Ok(Some(list)) if !list.is_empty() => list,
        Ok(_) => normalise_symbols(&config.tickers),
        Err(e) => {
            warn!(error = %e, "Failed to read watch-list, using configured tickers");
            normalise_symbols(&config.tickers)
        }
    };
    info!(path = %watchlist.path().display(), tickers = ?tickers, "Watch-list resolved");

    // ── 3. Provider ──────────────────────────────────────────────────────
    let rate_limit = Arc::new(RateLimitTracker::new());
    let request_timeout = Duration::from_secs(config.fetch.attempt_timeout_secs.max(1));
    let yahoo = Arc::new(
        YahooClient::new(request_timeout, rate_limit.clone())
            .context("failed to initialise Yahoo Finance client")?,
    );
    let price_feed: Arc<dyn PriceFeed> = yahoo.clone();
    let fundamentals_feed: Arc<dyn FundamentalsFeed> = yahoo;

    let admin_token = std::env::var(ENV_ADMIN_TOKEN).ok();
    if admin_token.is_none() {
        warn!("{ENV_ADMIN_TOKEN} not set: watch-list edits, refresh and abort are disabled");
    }

    let bind_addr = config.bind_addr.clone();

    // ── 4. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        config,
        price_feed,
        Some(fundamentals_feed),
        rate_limit,
        watchlist,
        tickers,
        admin_token,
    ));

    // ── 5. Start the API server ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 6. Refresh loop ──────────────────────────────────────────────────
    let refresh_state = state.clone();
    tokio::spawn(async move {
        loop {
            let report = refresh_state.run_once().await;
            info!(
                run_id = %report.run_id,
                rows = report.rows.len(),
                errors = report.error_count(),
                "Report published"
            );

            let interval = Duration::from_secs(
                refresh_state
                    .runtime_config
                    .read()
                    .refresh_interval_secs
                    .max(1),
            );
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = refresh_state.refresh_trigger.notified() => {
                    info!("Manual refresh triggered");
                }
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");
    state.abort.abort();

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("StockScope shut down complete.");
    Ok(())
}
