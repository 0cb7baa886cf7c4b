//! Metric sinks and their serializable summaries

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Kind of a metric, which decides the aggregations it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Rate => "rate",
            MetricKind::Trend => "trend",
        })
    }
}

/// Metrics produced by every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMetric {
    HttpReqs,
    HttpReqDuration,
    HttpReqFailed,
    HttpReqErrors,
    Checks,
    Iterations,
    IterationDuration,
    DroppedIterations,
    Vus,
    VusMax,
}

impl BuiltinMetric {
    pub const ALL: [BuiltinMetric; 10] = [
        BuiltinMetric::HttpReqs,
        BuiltinMetric::HttpReqDuration,
        BuiltinMetric::HttpReqFailed,
        BuiltinMetric::HttpReqErrors,
        BuiltinMetric::Checks,
        BuiltinMetric::Iterations,
        BuiltinMetric::IterationDuration,
        BuiltinMetric::DroppedIterations,
        BuiltinMetric::Vus,
        BuiltinMetric::VusMax,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinMetric::HttpReqs => "http_reqs",
            BuiltinMetric::HttpReqDuration => "http_req_duration",
            BuiltinMetric::HttpReqFailed => "http_req_failed",
            BuiltinMetric::HttpReqErrors => "http_req_errors",
            BuiltinMetric::Checks => "checks",
            BuiltinMetric::Iterations => "iterations",
            BuiltinMetric::IterationDuration => "iteration_duration",
            BuiltinMetric::DroppedIterations => "dropped_iterations",
            BuiltinMetric::Vus => "vus",
            BuiltinMetric::VusMax => "vus_max",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            BuiltinMetric::HttpReqs
            | BuiltinMetric::HttpReqErrors
            | BuiltinMetric::Iterations
            | BuiltinMetric::DroppedIterations => MetricKind::Counter,
            BuiltinMetric::HttpReqDuration | BuiltinMetric::IterationDuration => MetricKind::Trend,
            BuiltinMetric::HttpReqFailed | BuiltinMetric::Checks => MetricKind::Rate,
            BuiltinMetric::Vus | BuiltinMetric::VusMax => MetricKind::Gauge,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for BuiltinMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latency samples; every sample is kept so percentiles are exact
#[derive(Debug, Clone, Default)]
pub struct Trend {
    samples: Vec<Duration>,
}

impl Trend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: Duration) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn sorted_ms(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().map(|d| as_ms(*d)).collect();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    pub fn avg(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|d| as_ms(*d)).sum::<f64>() / self.samples.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.samples.iter().min().map(|d| as_ms(*d)).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.samples.iter().max().map(|d| as_ms(*d)).unwrap_or(0.0)
    }

    pub fn med(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Percentile (0-100) in milliseconds, interpolated between closest ranks
    pub fn percentile(&self, p: f64) -> f64 {
        percentile_of_sorted(&self.sorted_ms(), p)
    }

    pub fn summary(&self) -> TrendSummary {
        let sorted = self.sorted_ms();
        TrendSummary {
            count: sorted.len(),
            avg: self.avg(),
            min: sorted.first().copied().unwrap_or(0.0),
            med: percentile_of_sorted(&sorted, 50.0),
            max: sorted.last().copied().unwrap_or(0.0),
            p90: percentile_of_sorted(&sorted, 90.0),
            p95: percentile_of_sorted(&sorted, 95.0),
            p99: percentile_of_sorted(&sorted, 99.0),
        }
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = sorted[rank.floor() as usize];
            let hi = sorted[rank.ceil() as usize];
            lo + (hi - lo) * rank.fract()
        }
    }
}

/// Fraction of non-zero observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rate {
    pub hits: u64,
    pub total: u64,
}

impl Rate {
    pub fn add(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.hits += 1;
        }
    }

    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }

    pub fn summary(&self) -> RateSummary {
        RateSummary {
            rate: self.rate(),
            hits: self.hits,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateSummary {
    pub rate: f64,
    pub hits: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterSummary {
    pub count: u64,
    /// Per second over the run
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Aggregated view of every built-in metric
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub http_reqs: CounterSummary,
    pub http_req_duration: TrendSummary,
    pub http_req_failed: RateSummary,
    pub http_req_errors: CounterSummary,
    pub checks: RateSummary,
    pub check_results: Vec<CheckSummary>,
    pub iterations: CounterSummary,
    pub iteration_duration: TrendSummary,
    pub dropped_iterations: CounterSummary,
    pub vus: f64,
    pub vus_max: f64,
}
