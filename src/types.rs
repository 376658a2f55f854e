// =============================================================================
// Shared types used across the StockScope engine
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// One value in a report row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    /// The metric could not be computed or the provider had no value.
    NotAvailable,
    /// The whole row failed to fetch.
    Error,
}

impl Cell {
    /// `Number` for finite values, `NotAvailable` otherwise.
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Number(v),
            _ => Self::NotAvailable,
        }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(v) => serializer.serialize_f64(*v),
            Self::Text(s) => serializer.serialize_str(s),
            Self::NotAvailable => serializer.serialize_str("N/A"),
            Self::Error => serializer.serialize_str("Error"),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::NotAvailable => write!(f, "N/A"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Run-level cancellation flag shared between the API, the refresh loop and
/// in-flight batches.  Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before a new run starts.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Lifecycle of the background refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Idle,
    Running,
    Aborting,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Idle
    }
}
