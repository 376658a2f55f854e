// =============================================================================
// Rate-Limit Tracker — remembers provider throttling to avoid hammering it
// =============================================================================
//
// Yahoo Finance answers HTTP 429 when a client sends too many requests, often
// with a `Retry-After` header (seconds).  After a 429 the tracker arms a
// cool-down deadline; while it is armed, requests fail fast with
// `RateLimited` instead of going to the network.
//
// Counters are atomics so any task may query them lock-free.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cool-down used when a 429 carries no `Retry-After` header.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
/// Upper bound on any cool-down we honour.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(120);

/// Thread-safe rate-limit tracker backed by atomic counters.
pub struct RateLimitTracker {
    requests_sent: AtomicU64,
    rate_limited: AtomicU64,
    /// UNIX milliseconds until which requests should not be sent (0 = none).
    cooldown_until_ms: AtomicU64,
}

/// Immutable snapshot of the current rate-limit state (suitable for
/// serialisation into a dashboard payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub requests_sent: u64,
    pub rate_limited: u64,
    pub cooldown_remaining_ms: u64,
}

impl RateLimitTracker {
    /// Create a new tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            cooldown_until_ms: AtomicU64::new(0),
        }
    }

    // -------------------------------------------------------------------------
    // Header-based updates
    // -------------------------------------------------------------------------

    /// Parse the `Retry-After` header (delay-seconds form).
    pub fn retry_after_from_headers(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Record a 429 response and arm the cool-down.
    pub fn record_rate_limited(&self, retry_after: Option<Duration>) {
        let cooldown = retry_after.unwrap_or(DEFAULT_COOLDOWN).min(MAX_COOLDOWN);
        let until = now_ms() + cooldown.as_millis() as u64;
        self.cooldown_until_ms.fetch_max(until, Ordering::Relaxed);
        let total = self.rate_limited.fetch_add(1, Ordering::Relaxed) + 1;

        warn!(
            cooldown_ms = cooldown.as_millis() as u64,
            rate_limited_total = total,
            "provider rate limit hit — cooling down"
        );
    }

    // -------------------------------------------------------------------------
    // Pre-flight checks
    // -------------------------------------------------------------------------

    /// Remaining cool-down, if one is armed.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = self.cooldown_until_ms.load(Ordering::Relaxed);
        let now = now_ms();
        (until > now).then(|| Duration::from_millis(until - now))
    }

    /// Return `true` if a request may be sent now.  Counts the request when
    /// allowed.
    pub fn try_acquire(&self) -> bool {
        if let Some(remaining) = self.cooldown_remaining() {
            debug!(
                remaining_ms = remaining.as_millis() as u64,
                "request blocked — provider cool-down active"
            );
            return false;
        }
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        true
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    /// Produce a serialisable snapshot of the current counters.
    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            cooldown_remaining_ms: self
                .cooldown_remaining()
                .map_or(0, |d| d.as_millis() as u64),
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("requests_sent", &self.requests_sent.load(Ordering::Relaxed))
            .field("rate_limited", &self.rate_limited.load(Ordering::Relaxed))
            .field("cooldown_until_ms", &self.cooldown_until_ms.load(Ordering::Relaxed))
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn fresh_tracker_allows_requests() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.try_acquire());
        assert!(tracker.try_acquire());
        assert_eq!(tracker.snapshot().requests_sent, 2);
        assert_eq!(tracker.snapshot().cooldown_remaining_ms, 0);
    }

    #[test]
    fn rate_limit_arms_cooldown() {
        let tracker = RateLimitTracker::new();
        tracker.record_rate_limited(Some(Duration::from_secs(30)));
        assert!(!tracker.try_acquire());

        let snap = tracker.snapshot();
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(snap.requests_sent, 0);
        assert!(snap.cooldown_remaining_ms > 25_000);
    }

    #[test]
    fn cooldown_is_capped() {
        let tracker = RateLimitTracker::new();
        tracker.record_rate_limited(Some(Duration::from_secs(3600)));
        let remaining = tracker.cooldown_remaining().unwrap();
        assert!(remaining <= MAX_COOLDOWN);
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(
            RateLimitTracker::retry_after_from_headers(&headers),
            Some(Duration::from_secs(12))
        );

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(RateLimitTracker::retry_after_from_headers(&headers), None);
    }
}
