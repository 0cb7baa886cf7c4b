//! Test Utilities Module
//!
//! Provides a scripted transport and scenario fixtures for unit tests.
//! This module is only compiled when running tests.

#![cfg(test)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::scenario::{
    CredentialPool, LoadProfile, RequestCredential, Role, ScenarioConfig, SelectionStrategy,
    Target,
};
use crate::stats::Threshold;
use crate::transport::{HttpResponse, HttpTransport, RequestError, TargetRequest};

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Status(u16),
    EveryNthFails(u64),
    Unreachable,
}

/// Transport answering from a script and recording what it was sent
pub struct MockTransport {
    behavior: Behavior,
    latency: Duration,
    calls: AtomicU64,
    requests: Mutex<Vec<(String, String, String)>>,
}

impl MockTransport {
    fn with(behavior: Behavior, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            latency,
            calls: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always 200
    pub fn ok() -> Arc<Self> {
        Self::with(Behavior::Status(200), Duration::ZERO)
    }

    pub fn status(status: u16) -> Arc<Self> {
        Self::with(Behavior::Status(status), Duration::ZERO)
    }

    /// 500 for every `n`-th call, 200 otherwise
    pub fn every_nth_fails(n: u64) -> Arc<Self> {
        Self::with(Behavior::EveryNthFails(n), Duration::ZERO)
    }

    /// 200 after `latency`
    pub fn slow(latency: Duration) -> Arc<Self> {
        Self::with(Behavior::Status(200), latency)
    }

    /// Connection refused on every call
    pub fn unreachable() -> Arc<Self> {
        Self::with(Behavior::Unreachable, Duration::ZERO)
    }

    /// `(url, header name, header value)` per call, in call order
    pub async fn requests(&self) -> Vec<(String, String, String)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, request: &TargetRequest<'_>) -> Result<HttpResponse, RequestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().await.push((
            request.url.to_string(),
            request.header_name.to_string(),
            request.header_value.to_string(),
        ));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let status = match self.behavior {
            Behavior::Status(status) => status,
            Behavior::EveryNthFails(n) if call % n == 0 => 500,
            Behavior::EveryNthFails(_) => 200,
            Behavior::Unreachable => {
                return Err(RequestError::Connect("connection refused".to_string()));
            }
        };
        Ok(HttpResponse {
            status,
            body_len: 0,
        })
    }
}

// ============================================================================
// Scenario Fixtures
// ============================================================================

/// The source thresholds: p(95) under 100ms and almost no failures
pub fn test_thresholds() -> Vec<Threshold> {
    vec![
        Threshold::parse("http_req_duration", "p(95)<100").unwrap(),
        Threshold::parse("http_req_failed", "rate<0.0001").unwrap(),
    ]
}

/// Moderator + employee credentials, static moderator selection
pub fn test_credentials() -> CredentialPool {
    CredentialPool::new(
        [
            RequestCredential::new("auth-x", "moderator-token", Role::Moderator),
            RequestCredential::new("auth-x", "employee-token", Role::Employee),
        ],
        SelectionStrategy::Static(Role::Moderator),
    )
    .unwrap()
}

/// Scenario against the default target with a 30s profile
pub fn test_config(rate: u64, pre_allocated: usize, max_workers: usize) -> ScenarioConfig {
    ScenarioConfig {
        name: "test".to_string(),
        profile: LoadProfile::new(
            rate,
            Duration::from_secs(1),
            Duration::from_secs(30),
            pre_allocated,
            max_workers,
        )
        .unwrap(),
        thresholds: test_thresholds(),
        target: Target::default(),
        credentials: test_credentials(),
    }
}
