//! Scenario runner: validated configuration plus the iteration body

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::credentials::CredentialPool;
use super::profile::LoadProfile;
use super::target::Target;
use super::types::{CheckResult, ConfigError};
use crate::engine::{Iteration, Scheduler};
use crate::report::RunReport;
use crate::stats::{IterationSample, MetricsCollector, Threshold};
use crate::transport::{HttpTransport, TargetRequest};

/// Everything a run needs, immutable once the runner is configured
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub profile: LoadProfile,
    pub thresholds: Vec<Threshold>,
    pub target: Target,
    pub credentials: CredentialPool,
}

struct RunnerInner {
    config: ScenarioConfig,
    url: Url,
    check_name: String,
    transport: Arc<dyn HttpTransport>,
    collector: MetricsCollector,
}

/// Executes one request-and-check unit per iteration and turns the
/// aggregated metrics into a `RunReport`.
///
/// Cheap to clone; engines receive it as an `Iteration`.
#[derive(Clone)]
pub struct ScenarioRunner {
    inner: Arc<RunnerInner>,
}

impl ScenarioRunner {
    /// Validate `config` and bind it to a transport. No other side effects.
    pub fn configure(
        config: ScenarioConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigError> {
        config.profile.validate()?;
        let url = config.target.url()?;
        let check_name = config.target.check_name();

        debug!(
            scenario = %config.name,
            url = %url,
            thresholds = config.thresholds.len(),
            credentials = config.credentials.len(),
            "Scenario configured"
        );

        Ok(Self {
            inner: Arc::new(RunnerInner {
                config,
                url,
                check_name,
                transport,
                collector: MetricsCollector::new(),
            }),
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.inner.config
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.inner.collector
    }

    /// One GET plus one status check. Never fails: errors become a failed
    /// check and a failed request sample.
    pub async fn iteration(&self, index: u64) -> CheckResult {
        let inner = &self.inner;
        let started = Instant::now();

        let credential = inner.config.credentials.select(index);
        let header_value = credential.header_value();
        let request = TargetRequest {
            url: &inner.url,
            header_name: credential.header_name(),
            header_value: &header_value,
        };

        let result = inner.transport.get(&request).await;
        let request_duration = started.elapsed();

        let (status, failed, network_error) = match &result {
            Ok(response) => (
                Some(response.status),
                !(200..400).contains(&response.status),
                false,
            ),
            Err(e) => {
                debug!(iteration = index, error = %e, "Request failed");
                (None, true, true)
            }
        };

        let check = CheckResult {
            name: inner.check_name.clone(),
            passed: status == Some(inner.config.target.expected_status),
        };

        inner
            .collector
            .record_iteration(IterationSample {
                request_duration,
                status,
                failed,
                network_error,
                check: check.clone(),
                iteration_duration: started.elapsed(),
            })
            .await;

        check
    }

    /// Hand the iteration body to `scheduler` and evaluate every threshold
    /// once it returns.
    pub async fn run(&self, scheduler: &dyn Scheduler) -> RunReport {
        let config = &self.inner.config;
        let started_at = Utc::now();

        info!(
            scenario = %config.name,
            executor = scheduler.name(),
            url = %self.inner.url,
            rate = config.profile.arrival_rate(),
            duration = ?config.profile.test_duration(),
            "Starting run"
        );

        let iteration: Arc<dyn Iteration> = Arc::new(self.clone());
        let outcome = scheduler.schedule(iteration, &config.profile).await;

        let collector = &self.inner.collector;
        collector.record_dropped(outcome.dropped).await;
        collector
            .record_workers(outcome.peak_workers, config.profile.max_workers())
            .await;
        let snapshot = collector.snapshot(outcome.elapsed).await;

        let report = RunReport::build(config, scheduler.name(), started_at, &outcome, &snapshot);
        info!(
            run_id = %report.run_id,
            passed = report.passed,
            iterations = outcome.completed,
            dropped = outcome.dropped,
            "Run finished"
        );
        report
    }
}

#[async_trait]
impl Iteration for ScenarioRunner {
    async fn execute(&self, index: u64) {
        self.iteration(index).await;
    }
}
