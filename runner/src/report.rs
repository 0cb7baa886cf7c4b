//! End-of-run report: threshold verdicts and metric summaries

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

use crate::engine::ScheduleOutcome;
use crate::scenario::ScenarioConfig;
use crate::stats::{MetricsSnapshot, MetricsSummary, TrendSummary};

/// Exit code when every threshold passed
pub const EXIT_PASSED: u8 = 0;
/// Exit code when at least one threshold was violated
pub const EXIT_THRESHOLDS_FAILED: u8 = 1;

/// Verdict for a single threshold predicate
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub predicate: String,
    pub observed: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    pub executor: String,
    pub started: u64,
    pub completed: u64,
    pub dropped: u64,
    pub interrupted: u64,
    pub peak_workers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub schedule: ScheduleSummary,
    pub metrics: MetricsSummary,
    pub thresholds: Vec<ThresholdOutcome>,
    pub passed: bool,
}

impl RunReport {
    /// Evaluate every configured threshold against `snapshot`
    pub fn build(
        config: &ScenarioConfig,
        executor: &str,
        started_at: DateTime<Utc>,
        outcome: &ScheduleOutcome,
        snapshot: &MetricsSnapshot,
    ) -> Self {
        let thresholds: Vec<ThresholdOutcome> = config
            .thresholds
            .iter()
            .map(|threshold| {
                let (observed, passed) = snapshot.evaluate(threshold);
                ThresholdOutcome {
                    metric: threshold.metric().name().to_string(),
                    predicate: threshold.predicate().to_string(),
                    observed,
                    passed,
                }
            })
            .collect();
        let passed = thresholds.iter().all(|t| t.passed);

        Self {
            run_id: Uuid::new_v4(),
            scenario: config.name.clone(),
            started_at,
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            schedule: ScheduleSummary {
                executor: executor.to_string(),
                started: outcome.started,
                completed: outcome.completed,
                dropped: outcome.dropped,
                interrupted: outcome.interrupted,
                peak_workers: outcome.peak_workers,
            },
            metrics: snapshot.summary(),
            thresholds,
            passed,
        }
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed {
            EXIT_PASSED
        } else {
            EXIT_THRESHOLDS_FAILED
        }
    }

    pub fn violations(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON report to `path`
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
    }

    /// Print a human-readable summary
    pub fn print_summary(&self) {
        let m = &self.metrics;

        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!(
            " RUN: {} ({}, {:.1}s)",
            self.scenario, self.schedule.executor, self.elapsed_secs
        );
        println!("═══════════════════════════════════════════════════════════════");
        println!();

        println!(" ─── Checks ──────────────────────────────────────────────────");
        for check in &m.check_results {
            let total = check.passes + check.fails;
            let pct = if total > 0 {
                check.passes as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            println!(
                "   {:<24} {:>6.2}%  ✓ {} ✗ {}",
                check.name, pct, check.passes, check.fails
            );
        }
        println!();

        println!(" ─── Metrics ─────────────────────────────────────────────────");
        print_trend("http_req_duration", &m.http_req_duration);
        println!(
            "   {:<20} {:.4}%  {} of {}",
            "http_req_failed",
            m.http_req_failed.rate * 100.0,
            m.http_req_failed.hits,
            m.http_req_failed.total
        );
        println!(
            "   {:<20} {}  {:.1}/s",
            "http_reqs", m.http_reqs.count, m.http_reqs.rate
        );
        println!("   {:<20} {}", "http_req_errors", m.http_req_errors.count);
        print_trend("iteration_duration", &m.iteration_duration);
        println!(
            "   {:<20} {}  {:.1}/s",
            "iterations", m.iterations.count, m.iterations.rate
        );
        println!(
            "   {:<20} {}",
            "dropped_iterations", m.dropped_iterations.count
        );
        println!("   {:<20} {} (max {})", "vus", m.vus, m.vus_max);
        println!();

        println!(" ─── Thresholds ──────────────────────────────────────────────");
        for t in &self.thresholds {
            println!(
                "   {} {:<20} {:<14} observed {:.4}",
                if t.passed { "✓" } else { "✗" },
                t.metric,
                t.predicate,
                t.observed
            );
        }
        println!();

        println!("═══════════════════════════════════════════════════════════════");
        println!(" OVERALL: {}", if self.passed { "PASS" } else { "FAIL" });
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

fn print_trend(name: &str, t: &TrendSummary) {
    println!(
        "   {:<20} avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
        name, t.avg, t.min, t.med, t.max, t.p90, t.p95
    );
}
