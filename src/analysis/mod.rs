pub mod chart;
pub mod pipeline;
pub mod report;
pub mod result;

pub use chart::ChartSeries;
pub use pipeline::run_batch;
pub use report::{Report, ReportRow};
pub use result::IndicatorResult;
