pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod yahoo;

use async_trait::async_trait;

use crate::market_data::{Fundamentals, PriceSeries};

pub use error::FetchError;
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
pub use retry::{with_retry, RetryPolicy};
pub use yahoo::YahooClient;

/// Source of daily price history.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Daily bars covering at least `lookback` up to the latest session,
    /// oldest first.
    async fn fetch_history(
        &self,
        ticker: &str,
        lookback: chrono::Duration,
    ) -> Result<PriceSeries, FetchError>;
}

/// Source of point-in-time valuation and quality metrics.
#[async_trait]
pub trait FundamentalsFeed: Send + Sync {
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FetchError>;
}
