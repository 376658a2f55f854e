// =============================================================================
// Watch-list store — flat file of comma-separated ticker symbols
// =============================================================================

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Longest symbol accepted (Yahoo symbols such as `^GSPC` or `EURUSD=X` are
/// far shorter).
const MAX_SYMBOL_LEN: usize = 20;

/// Whether `symbol` only uses characters that appear in exchange tickers:
/// ASCII letters and digits plus `.`, `-`, `^` and `=`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
}

/// Trim, upper-case and de-duplicate symbols, keeping first-seen order.
/// Empties are dropped silently, invalid symbols with a warning.
pub fn normalise_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for raw in symbols {
        let symbol = raw.as_ref().trim().to_ascii_uppercase();
        if symbol.is_empty() || out.contains(&symbol) {
            continue;
        }
        if !is_valid_symbol(&symbol) {
            warn!(symbol = %symbol, "ignoring invalid ticker symbol");
            continue;
        }
        out.push(symbol);
    }
    out
}

#[derive(Debug, Clone)]
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the watch-list.  `Ok(None)` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<Vec<String>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no watch-list file");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read watch-list from {}", self.path.display())
                })
            }
        };

        let tickers = normalise_symbols(content.split(|c: char| c == ',' || c == '\n'));
        debug!(path = %self.path.display(), count = tickers.len(), "watch-list loaded");
        Ok(Some(tickers))
    }

    /// Normalise and persist `tickers` atomically.  Returns what was written.
    pub fn save<S: AsRef<str>>(&self, tickers: &[S]) -> Result<Vec<String>> {
        let tickers = normalise_symbols(tickers);
        let tmp_path = self.path.with_extension("tmp");

        std::fs::write(&tmp_path, tickers.join(","))
            .with_context(|| format!("failed to write tmp watch-list to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp watch-list to {}", self.path.display()))?;

        info!(path = %self.path.display(), count = tickers.len(), "watch-list saved");
        Ok(tickers)
    }
}
