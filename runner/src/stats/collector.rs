//! Run-wide metric aggregation shared by all workers

use indexmap::IndexMap;
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::threshold::{Aggregation, Threshold};
use super::types::{
    BuiltinMetric, CheckSummary, CounterSummary, MetricsSummary, Rate, Trend,
};
use crate::scenario::CheckResult;

/// Everything observed during one iteration
#[derive(Debug, Clone)]
pub struct IterationSample {
    pub request_duration: Duration,
    pub status: Option<u16>,
    /// Network error or a status outside 200-399
    pub failed: bool,
    /// Request never produced a response
    pub network_error: bool,
    pub check: CheckResult,
    pub iteration_duration: Duration,
}

#[derive(Debug, Default, Clone)]
struct Store {
    http_reqs: u64,
    http_req_duration: Trend,
    http_req_failed: Rate,
    http_req_errors: u64,
    checks: IndexMap<String, Rate>,
    iterations: u64,
    iteration_duration: Trend,
    dropped_iterations: u64,
    vus: f64,
    vus_max: f64,
}

/// Thread-safe metrics aggregator.
///
/// Samples are also forwarded to the `metrics` facade so a live exporter
/// sees the run while it is in progress.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    store: Arc<Mutex<Store>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_iteration(&self, sample: IterationSample) {
        let status_label = sample
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "error".to_string());
        counter!("pvz_load_http_reqs_total", "status" => status_label).increment(1);
        histogram!("pvz_load_http_req_duration_seconds")
            .record(sample.request_duration.as_secs_f64());
        counter!(
            "pvz_load_checks_total",
            "result" => if sample.check.passed { "pass" } else { "fail" }
        )
        .increment(1);

        let mut store = self.store.lock().await;
        store.http_reqs += 1;
        store.http_req_duration.record(sample.request_duration);
        store.http_req_failed.add(sample.failed);
        if sample.network_error {
            store.http_req_errors += 1;
        }
        store
            .checks
            .entry(sample.check.name)
            .or_default()
            .add(sample.check.passed);
        store.iterations += 1;
        store.iteration_duration.record(sample.iteration_duration);
    }

    pub async fn record_dropped(&self, count: u64) {
        counter!("pvz_load_dropped_iterations_total").increment(count);
        self.store.lock().await.dropped_iterations += count;
    }

    pub async fn record_workers(&self, peak: usize, max: usize) {
        gauge!("pvz_load_vus").set(peak as f64);
        gauge!("pvz_load_vus_max").set(max as f64);
        let mut store = self.store.lock().await;
        store.vus = peak as f64;
        store.vus_max = max as f64;
    }

    /// Freeze the current state; `elapsed` drives per-second counter rates
    pub async fn snapshot(&self, elapsed: Duration) -> MetricsSnapshot {
        MetricsSnapshot {
            store: self.store.lock().await.clone(),
            elapsed,
        }
    }
}

/// Point-in-time copy of the collector used for threshold evaluation
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    store: Store,
    elapsed: Duration,
}

impl MetricsSnapshot {
    fn per_second(&self, count: u64) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { count as f64 / secs } else { 0.0 }
    }

    fn checks_rate(&self) -> Rate {
        self.store
            .checks
            .values()
            .fold(Rate::default(), |acc, r| Rate {
                hits: acc.hits + r.hits,
                total: acc.total + r.total,
            })
    }

    fn counter(&self, metric: BuiltinMetric) -> u64 {
        match metric {
            BuiltinMetric::HttpReqs => self.store.http_reqs,
            BuiltinMetric::HttpReqErrors => self.store.http_req_errors,
            BuiltinMetric::Iterations => self.store.iterations,
            BuiltinMetric::DroppedIterations => self.store.dropped_iterations,
            _ => 0,
        }
    }

    /// Value of `aggregation` over `metric`; 0 when nothing was recorded
    pub fn aggregate(&self, metric: BuiltinMetric, aggregation: Aggregation) -> f64 {
        let trend = match metric {
            BuiltinMetric::HttpReqDuration => Some(&self.store.http_req_duration),
            BuiltinMetric::IterationDuration => Some(&self.store.iteration_duration),
            _ => None,
        };
        if let Some(trend) = trend {
            return match aggregation {
                Aggregation::Avg => trend.avg(),
                Aggregation::Min => trend.min(),
                Aggregation::Max => trend.max(),
                Aggregation::Med => trend.med(),
                Aggregation::Percentile(p) => trend.percentile(p),
                _ => 0.0,
            };
        }

        match (metric, aggregation) {
            (BuiltinMetric::HttpReqFailed, _) => self.store.http_req_failed.rate(),
            (BuiltinMetric::Checks, _) => self.checks_rate().rate(),
            (BuiltinMetric::Vus, _) => self.store.vus,
            (BuiltinMetric::VusMax, _) => self.store.vus_max,
            (m, Aggregation::Rate) => self.per_second(self.counter(m)),
            (m, _) => self.counter(m) as f64,
        }
    }

    /// Observed value and verdict for a threshold
    pub fn evaluate(&self, threshold: &Threshold) -> (f64, bool) {
        let observed = self.aggregate(threshold.metric(), threshold.aggregation());
        (observed, threshold.evaluate(observed))
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn summary(&self) -> MetricsSummary {
        let counter = |m: BuiltinMetric| {
            let count = self.counter(m);
            CounterSummary {
                count,
                rate: self.per_second(count),
            }
        };
        MetricsSummary {
            http_reqs: counter(BuiltinMetric::HttpReqs),
            http_req_duration: self.store.http_req_duration.summary(),
            http_req_failed: self.store.http_req_failed.summary(),
            http_req_errors: counter(BuiltinMetric::HttpReqErrors),
            checks: self.checks_rate().summary(),
            check_results: self
                .store
                .checks
                .iter()
                .map(|(name, rate)| CheckSummary {
                    name: name.clone(),
                    passes: rate.hits,
                    fails: rate.total - rate.hits,
                })
                .collect(),
            iterations: counter(BuiltinMetric::Iterations),
            iteration_duration: self.store.iteration_duration.summary(),
            dropped_iterations: counter(BuiltinMetric::DroppedIterations),
            vus: self.store.vus,
            vus_max: self.store.vus_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ms: u64, status: Option<u16>) -> IterationSample {
        let failed = status.is_none_or(|s| !(200..400).contains(&s));
        IterationSample {
            request_duration: Duration::from_millis(ms),
            status,
            failed,
            network_error: status.is_none(),
            check: CheckResult {
                name: "status is 200".to_string(),
                passed: status == Some(200),
            },
            iteration_duration: Duration::from_millis(ms + 1),
        }
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_zero() {
        let collector = MetricsCollector::new();
        let snap = collector.snapshot(Duration::from_secs(1)).await;
        let p95 = Threshold::parse("http_req_duration", "p(95)<100").unwrap();
        assert_eq!(snap.evaluate(&p95), (0.0, true));
        assert_eq!(
            snap.aggregate(BuiltinMetric::HttpReqFailed, Aggregation::Rate),
            0.0
        );
        assert!(snap.summary().check_results.is_empty());
    }

    #[tokio::test]
    async fn test_failure_rate_and_checks() {
        let collector = MetricsCollector::new();
        for i in 0..100 {
            let status = if i == 0 { Some(500) } else { Some(200) };
            collector.record_iteration(sample(10, status)).await;
        }
        let snap = collector.snapshot(Duration::from_secs(2)).await;

        let failed = snap.aggregate(BuiltinMetric::HttpReqFailed, Aggregation::Rate);
        assert!((failed - 0.01).abs() < 1e-12);
        let checks = snap.aggregate(BuiltinMetric::Checks, Aggregation::Rate);
        assert!((checks - 0.99).abs() < 1e-12);
        assert_eq!(snap.aggregate(BuiltinMetric::HttpReqs, Aggregation::Count), 100.0);
        assert_eq!(snap.aggregate(BuiltinMetric::HttpReqs, Aggregation::Rate), 50.0);

        let summary = snap.summary();
        assert_eq!(summary.check_results.len(), 1);
        assert_eq!(summary.check_results[0].name, "status is 200");
        assert_eq!(summary.check_results[0].passes, 99);
        assert_eq!(summary.check_results[0].fails, 1);
        assert_eq!(summary.http_req_errors.count, 0);
    }

    #[tokio::test]
    async fn test_network_errors_counted_separately() {
        let collector = MetricsCollector::new();
        collector.record_iteration(sample(5, None)).await;
        collector.record_iteration(sample(5, Some(404))).await;
        collector.record_iteration(sample(5, Some(200))).await;
        let summary = collector.snapshot(Duration::from_secs(1)).await.summary();

        assert_eq!(summary.http_req_failed.hits, 2);
        assert_eq!(summary.http_req_errors.count, 1);
        assert_eq!(summary.checks.hits, 1);
    }

    #[tokio::test]
    async fn test_redirects_do_not_count_as_failed() {
        let collector = MetricsCollector::new();
        collector.record_iteration(sample(5, Some(302))).await;
        let snap = collector.snapshot(Duration::from_secs(1)).await;
        assert_eq!(
            snap.aggregate(BuiltinMetric::HttpReqFailed, Aggregation::Rate),
            0.0
        );
        // ...but the status check still fails
        assert_eq!(snap.aggregate(BuiltinMetric::Checks, Aggregation::Rate), 0.0);
    }

    #[tokio::test]
    async fn test_latency_threshold_violation() {
        let collector = MetricsCollector::new();
        for _ in 0..20 {
            collector.record_iteration(sample(200, Some(200))).await;
        }
        let snap = collector.snapshot(Duration::from_secs(1)).await;
        let p95 = Threshold::parse("http_req_duration", "p(95)<100").unwrap();
        let (observed, passed) = snap.evaluate(&p95);
        assert!(observed >= 200.0);
        assert!(!passed);
    }

    #[tokio::test]
    async fn test_workers_and_dropped() {
        let collector = MetricsCollector::new();
        collector.record_dropped(3).await;
        collector.record_workers(7, 10).await;
        let snap = collector.snapshot(Duration::from_secs(1)).await;
        assert_eq!(
            snap.aggregate(BuiltinMetric::DroppedIterations, Aggregation::Count),
            3.0
        );
        assert_eq!(snap.aggregate(BuiltinMetric::Vus, Aggregation::Value), 7.0);
        assert_eq!(snap.aggregate(BuiltinMetric::VusMax, Aggregation::Value), 10.0);
    }
}
