//! Time-series trends over statement history: regression, CAGR, moving
//! averages, anomalies and seasonality.

pub mod analyzer;
pub mod indicators;
pub mod metric;
pub mod regression;
pub mod report;


pub use analyzer::TrendAnalyzer;
pub use indicators::*;
pub use metric::TrendMetric;
pub use regression::*;
pub use report::{analyze_series, TrendOptions, TrendPoint, TrendReport, TrendStatus};
