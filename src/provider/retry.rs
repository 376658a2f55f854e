// =============================================================================
// Bounded retry with per-attempt timeout and exponential backoff
// =============================================================================
//
// Only transient failures (RateLimited, CoolingDown, NetworkError) are
// retried.  A provider `Retry-After` hint raises the delay for that attempt up
// to the tracker's cool-down ceiling, so the next attempt lands after the
// cool-down instead of inside it.  A request rejected before it left (an armed
// cool-down) is waited out without spending an attempt.  Once the run-level
// abort signal is raised no further attempt is issued.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::provider::rate_limit::MAX_COOLDOWN;
use crate::provider::FetchError;
use crate::types::AbortSignal;

/// Retry settings for one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1).
    pub max_attempts: u32,
    /// Deadline for a single attempt.
    pub attempt_timeout: Duration,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_backoff: Duration,
    /// Ceiling for the exponential delay.  A provider hint may exceed it,
    /// up to [`MAX_COOLDOWN`].
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(15),
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32, err: &FetchError) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        match err {
            FetchError::RateLimited {
                retry_after: Some(hint),
            } => delay.max((*hint).min(MAX_COOLDOWN)),
            FetchError::CoolingDown { remaining } => delay.max((*remaining).min(MAX_COOLDOWN)),
            _ => delay,
        }
    }
}

/// Cool-down waits allowed per call on top of the attempt budget.
const MAX_COOLDOWN_WAITS: u32 = 8;

/// Run `op` until it succeeds, fails definitively, or the attempt budget is
/// spent.  The last error is returned on failure.
pub async fn with_retry<T, F, Fut>(
    ticker: &str,
    what: &'static str,
    policy: &RetryPolicy,
    abort: &AbortSignal,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    let mut cooldown_waits = 0;

    loop {
        attempt += 1;

        let err = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    debug!(ticker, what, attempt, "fetch succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(_) => FetchError::NetworkError(format!(
                "timed out after {} ms",
                policy.attempt_timeout.as_millis()
            )),
        };

        if let FetchError::CoolingDown { remaining } = err {
            if abort.is_aborted() || cooldown_waits >= MAX_COOLDOWN_WAITS {
                return Err(err);
            }
            cooldown_waits += 1;
            attempt -= 1;
            let delay = remaining.min(MAX_COOLDOWN);
            debug!(
                ticker,
                what,
                delay_ms = delay.as_millis() as u64,
                "waiting out provider cool-down"
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        if !err.is_transient() || attempt >= max_attempts || abort.is_aborted() {
            return Err(err);
        }

        let delay = policy.backoff_for(attempt, &err);
        warn!(
            ticker,
            what,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient fetch failure — retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_millis(200),
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry("AAPL", "history", &fast_policy(3), &AbortSignal::new(), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(FetchError::NetworkError("reset".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_never_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> =
            with_retry("ZZZZ", "history", &fast_policy(5), &AbortSignal::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::NotFound("ZZZZ".into()))
            })
            .await;

        assert_eq!(result, Err(FetchError::NotFound("ZZZZ".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> =
            with_retry("AAPL", "history", &fast_policy(4), &AbortSignal::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::RateLimited { retry_after: None })
            })
            .await;

        assert!(matches!(result, Err(FetchError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn slow_attempt_times_out_as_network_error() {
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(10),
            ..fast_policy(1)
        };
        let result: Result<(), _> = with_retry("AAPL", "history", &policy, &AbortSignal::new(), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(FetchError::NetworkError(_))));
    }

    #[tokio::test]
    async fn abort_stops_further_attempts() {
        let abort = AbortSignal::new();
        abort.abort();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry("AAPL", "history", &fast_policy(5), &abort, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::NetworkError("reset".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            attempt_timeout: Duration::from_secs(1),
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        let err = FetchError::NetworkError("x".into());
        assert_eq!(policy.backoff_for(1, &err), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2, &err), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3, &err), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(4, &err), Duration::from_millis(500));
    }

    #[test]
    fn backoff_honours_retry_after() {
        let policy = RetryPolicy::default();
        let hinted = |secs| FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(secs)),
        };
        assert_eq!(policy.backoff_for(1, &hinted(3)), Duration::from_secs(3));
        // Hints above `max_backoff` are honoured up to the cool-down ceiling.
        assert_eq!(policy.backoff_for(1, &hinted(30)), Duration::from_secs(30));
        assert_eq!(policy.backoff_for(1, &hinted(3600)), MAX_COOLDOWN);
    }

    #[tokio::test]
    async fn cooldown_rejections_do_not_spend_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry("AAPL", "history", &fast_policy(1), &AbortSignal::new(), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 4 {
                Err(FetchError::CoolingDown {
                    remaining: Duration::from_millis(2),
                })
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cooldown_waits_are_bounded_and_abort_aware() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> =
            with_retry("AAPL", "history", &fast_policy(1), &AbortSignal::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::CoolingDown {
                    remaining: Duration::from_millis(1),
                })
            })
            .await;
        assert!(matches!(result, Err(FetchError::CoolingDown { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_COOLDOWN_WAITS + 1);

        let abort = AbortSignal::new();
        abort.abort();
        let result: Result<(), _> = with_retry("AAPL", "history", &fast_policy(3), &abort, || async {
            Err(FetchError::CoolingDown {
                remaining: Duration::from_secs(60),
            })
        })
        .await;
        assert!(matches!(result, Err(FetchError::CoolingDown { .. })));
    }
}
