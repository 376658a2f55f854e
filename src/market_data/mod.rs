pub mod fundamentals;
pub mod price_series;

// Re-export for convenient access (e.g. `use crate::market_data::PriceSeries`).
pub use fundamentals::Fundamentals;
pub use price_series::{DailyBar, PriceSeries};
