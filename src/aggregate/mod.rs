//! Top-N and hourly histogram aggregation

pub mod engine;
pub mod histogram;
pub mod scope;
pub mod window;

pub use engine::{AggregationEngine, DestinationSummary, HistogramBucket, TOP_N_LIMIT};
pub use histogram::{hour_buckets, HISTOGRAM_BUCKETS};
pub use scope::Scope;
pub use window::TimeRange;
