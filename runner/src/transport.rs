//! HTTP transport used by iterations
//!
//! `HttpTransport` keeps the runner independent of the HTTP client so it can
//! be exercised without a network.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout; there are no retries
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Network-level failures. Recorded as failed checks, never fatal.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Other(String),
}

/// A single authenticated GET
#[derive(Debug)]
pub struct TargetRequest<'a> {
    pub url: &'a Url,
    pub header_name: &'a str,
    pub header_value: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body_len: usize,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue the request and read the whole body
    async fn get(&self, request: &TargetRequest<'_>) -> Result<HttpResponse, RequestError>;
}

/// `reqwest`-backed transport with a shared connection pool
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, pool_size: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(pool_size)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> RequestError {
        if err.is_timeout() {
            RequestError::Timeout(self.timeout)
        } else if err.is_connect() {
            RequestError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            RequestError::Body(err.to_string())
        } else {
            RequestError::Other(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &TargetRequest<'_>) -> Result<HttpResponse, RequestError> {
        let response = self
            .client
            .get(request.url.clone())
            .header(request.header_name, request.header_value)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse {
            status,
            body_len: body.len(),
        })
    }
}
