// =============================================================================
// Runtime Configuration — Engine settings with atomic save
// =============================================================================
//
// Central configuration hub for StockScope.  Indicator parameters, fetch
// behaviour and service settings all live here.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::indicators::crossover::CrossoverParams;
use crate::indicators::macd::MacdParams;
use crate::provider::RetryPolicy;
use crate::watchlist::normalise_symbols;

pub const ENV_TICKERS: &str = "STOCKSCOPE_TICKERS";
pub const ENV_BIND_ADDR: &str = "STOCKSCOPE_BIND_ADDR";
pub const ENV_WATCHLIST: &str = "STOCKSCOPE_WATCHLIST";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_tickers() -> Vec<String> {
    ["AAPL", "MSFT", "GOOGL", "TSLA", "AMZN"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_rsi_period() -> usize {
    14
}

fn default_lookback_days() -> i64 {
    365
}

fn default_attempt_timeout_secs() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_concurrency() -> usize {
    4
}

fn default_refresh_interval_secs() -> u64 {
    900
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_watchlist_path() -> String {
    "tickers.txt".to_string()
}

// =============================================================================
// IndicatorParams
// =============================================================================

/// Parameters for the three calculators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// RSI look-back period in trading days.
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default)]
    pub macd: MacdParams,

    #[serde(default)]
    pub crossover: CrossoverParams,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            macd: MacdParams::default(),
            crossover: CrossoverParams::default(),
        }
    }
}

// =============================================================================
// FetchParams
// =============================================================================

/// How much history to request and how hard to try.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchParams {
    /// Calendar days of daily history requested per ticker.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Deadline for a single provider attempt.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Total attempts per call, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Tickers processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl FetchParams {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs.max(1)),
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookback_days.max(1))
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Fallback ticker list used when no watch-list file exists.
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub fetch: FetchParams,

    /// Seconds between scheduled report refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Address the REST API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Comma-separated ticker file.
    #[serde(default = "default_watchlist_path")]
    pub watchlist_path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            indicators: IndicatorParams::default(),
            fetch: FetchParams::default(),
            refresh_interval_secs: default_refresh_interval_secs(),
            bind_addr: default_bind_addr(),
            watchlist_path: default_watchlist_path(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            tickers = ?config.tickers,
            lookback_days = config.fetch.lookback_days,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `STOCKSCOPE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_TICKERS) {
            let tickers = normalise_symbols(raw.split(','));
            if !tickers.is_empty() {
                debug!(?tickers, "tickers overridden from environment");
                self.tickers = tickers;
            }
        }
        if let Some(addr) = get(ENV_BIND_ADDR) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(path) = get(ENV_WATCHLIST) {
            self.watchlist_path = path.trim().to_string();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.tickers, vec!["AAPL", "MSFT", "GOOGL", "TSLA", "AMZN"]);
        assert_eq!(cfg.indicators.rsi_period, 14);
        assert_eq!(cfg.indicators.macd.long_span, 26);
        assert_eq!(cfg.indicators.crossover.long_window, 200);
        assert_eq!(cfg.fetch.lookback_days, 365);
        assert_eq!(cfg.fetch.max_attempts, 3);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "tickers": ["NVDA"],
            "indicators": { "macd": { "short_span": 5 }, "crossover": { "lookback": 10 } },
            "fetch": { "concurrency": 8 }
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.tickers, vec!["NVDA"]);
        assert_eq!(cfg.indicators.rsi_period, 14);
        assert_eq!(cfg.indicators.macd.short_span, 5);
        assert_eq!(cfg.indicators.macd.long_span, 26);
        assert_eq!(cfg.indicators.crossover.lookback, 10);
        assert_eq!(cfg.indicators.crossover.short_window, 50);
        assert_eq!(cfg.fetch.concurrency, 8);
        assert_eq!(cfg.fetch.lookback_days, 365);
    }

    #[test]
    fn retry_policy_mirrors_fetch_params() {
        let fetch = FetchParams {
            max_attempts: 0,
            attempt_timeout_secs: 7,
            base_backoff_ms: 250,
            ..FetchParams::default()
        };
        let policy = fetch.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(7));
        assert_eq!(policy.base_backoff, Duration::from_millis(250));
        assert_eq!(fetch.lookback(), chrono::Duration::days(365));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TICKERS, " nvda, amd ,,NVDA"),
            (ENV_BIND_ADDR, "127.0.0.1:9000"),
            (ENV_WATCHLIST, "   "),
        ]);
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.tickers, vec!["NVDA", "AMD"]);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.watchlist_path, "tickers.txt");
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("stockscope-cfg-{}.json", uuid::Uuid::new_v4()));
        let mut cfg = RuntimeConfig::default();
        cfg.refresh_interval_secs = 60;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        let _ = std::fs::remove_file(&path);
    }
}
