// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Read-only endpoints (health, report,
// chart, watch-list GET) are public;
// anything that changes state (watch-list edits, refresh, abort) requires a
// valid Bearer token checked via the `AuthBearer` extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::analysis::ChartSeries;
use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::provider::{with_retry, FetchError};
use crate::types::AbortSignal;
use crate::watchlist::is_valid_symbol;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/report", get(report))
        .route("/api/v1/report.csv", get(report_csv))
        .route("/api/v1/chart/:ticker", get(chart))
        .route("/api/v1/watchlist", get(get_watchlist).put(set_watchlist))
        .route("/api/v1/refresh", post(refresh))
        .route("/api/v1/abort", post(abort))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

// =============================================================================
// Report (public)
// =============================================================================

async fn report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_report() {
        Some(report) => Json(report.as_ref()).into_response(),
        None => {
            let body = serde_json::json!({ "report": null, "message": "No report available yet" });
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
    }
}

async fn report_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_report() {
        Some(report) => (
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            report.to_csv(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no report available yet").into_response(),
    }
}

// =============================================================================
// Chart (public)
// =============================================================================

async fn chart(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> impl IntoResponse {
    let ticker = ticker.trim().to_ascii_uppercase();
    if !is_valid_symbol(&ticker) {
        let body = serde_json::json!({ "error": format!("invalid ticker symbol {ticker:?}") });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let config = state.runtime_config.read().clone();
    let policy = config.fetch.retry_policy();
    let lookback = config.fetch.lookback();

    // Independent of the batch run's abort signal.
    let abort = AbortSignal::new();
    let fetched = with_retry(&ticker, "chart", &policy, &abort, || {
        state.price_feed.fetch_history(&ticker, lookback)
    })
    .await;

    let series = match fetched {
        Ok(series) => series,
        Err(err @ (FetchError::NotFound(_) | FetchError::Empty(_))) => {
            debug!(ticker = %ticker, error = %err, "chart requested for unknown ticker");
            let body = serde_json::json!({ "error": err.to_string() });
            return (StatusCode::NOT_FOUND, Json(body)).into_response();
        }
        Err(err) => {
            warn!(ticker = %ticker, error = %err, "chart history fetch failed");
            let body = serde_json::json!({ "error": err.to_string() });
            return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
        }
    };

    match ChartSeries::build(&ticker, &series, &config.indicators) {
        Some(chart) => Json(chart).into_response(),
        None => {
            let body = serde_json::json!({ "error": format!("provider returned no data for {ticker}") });
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
    }
}

// =============================================================================
// Watch-list
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct WatchlistBody {
    tickers: Vec<String>,
}

async fn get_watchlist(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(WatchlistBody {
        tickers: state.tickers.read().clone(),
    })
}

async fn set_watchlist(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(body): Json<WatchlistBody>,
) -> impl IntoResponse {
    if body.tickers.iter().all(|t| t.trim().is_empty()) {
        let body = serde_json::json!({ "error": "watch-list must contain at least one ticker" });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let invalid: Vec<&str> = body
        .tickers
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && !is_valid_symbol(&t.to_ascii_uppercase()))
        .collect();
    if !invalid.is_empty() {
        let body = serde_json::json!({ "error": "invalid ticker symbols", "invalid": invalid });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    match state.set_tickers(&body.tickers) {
        Ok(tickers) => Json(WatchlistBody { tickers }).into_response(),
        Err(e) => {
            error!(error = %e, "failed to save watch-list");
            state.push_error(format!("watch-list save failed: {e:#}"), None);
            let body = serde_json::json!({ "error": "failed to save watch-list" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

// =============================================================================
// Run control (authenticated)
// =============================================================================

async fn refresh(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.request_refresh();
    info!("refresh requested via API");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "refresh scheduled" })),
    )
}

async fn abort(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let aborted = state.request_abort();
    Json(serde_json::json!({ "aborted": aborted }))
}
