//! Metric aggregation and threshold evaluation
//!
//! This module provides:
//! - Metric sinks (trend, rate) and the built-in metric catalogue
//! - `Threshold` parsing for predicates such as `p(95)<100`
//! - `MetricsCollector` for aggregating samples across workers

mod collector;
mod threshold;
mod types;

pub use collector::{IterationSample, MetricsCollector, MetricsSnapshot};
pub use threshold::{Aggregation, Operator, Threshold, ThresholdError};
pub use types::{
    BuiltinMetric, CheckSummary, CounterSummary, MetricKind, MetricsSummary, Rate, RateSummary,
    Trend, TrendSummary,
};
