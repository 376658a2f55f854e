use std::time::Duration;

use thiserror::Error;

/// Failure modes of a market-data provider call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The provider does not know the ticker. Definitive; never retried.
    #[error("ticker {0} not found")]
    NotFound(String),

    /// The provider throttled us. `retry_after` carries the provider's hint
    /// when one was sent.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// The request was not sent because a provider cool-down is still armed.
    /// Waiting out `remaining` does not count as a retry attempt.
    #[error("provider cool-down active for {} ms", .remaining.as_millis())]
    CoolingDown { remaining: Duration },

    /// The provider refused the request (HTTP 401/403 or an `Unauthorized`
    /// error payload). Not retried with the same credentials.
    #[error("provider refused access: {0}")]
    Unauthorized(String),

    /// Transport failure, timeout or provider-side 5xx.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The request succeeded but returned no usable data.
    #[error("provider returned no data for {0}")]
    Empty(String),

    /// The payload could not be decoded.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::CoolingDown { .. } | Self::NetworkError(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FetchError::RateLimited { retry_after: None }.is_transient());
        assert!(FetchError::NetworkError("reset".into()).is_transient());
        assert!(FetchError::CoolingDown {
            remaining: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!FetchError::Unauthorized("Invalid Crumb".into()).is_transient());
        assert!(!FetchError::NotFound("ZZZZ".into()).is_transient());
        assert!(!FetchError::Empty("AAPL".into()).is_transient());
        assert!(!FetchError::Malformed("bad json".into()).is_transient());
    }

    #[test]
    fn display_names_the_ticker() {
        assert_eq!(FetchError::NotFound("ZZZZ".into()).to_string(), "ticker ZZZZ not found");
    }
}
