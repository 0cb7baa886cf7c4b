//! Scenario-related types and error definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::stats::ThresholdError;

/// Errors raised while building or validating a scenario
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Arrival rate must be greater than zero")]
    ZeroArrivalRate,

    #[error("Pre-allocated workers ({pre_allocated}) exceed max workers ({max})")]
    WorkerBounds { pre_allocated: usize, max: usize },

    #[error("Max workers must be greater than zero")]
    ZeroMaxWorkers,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Invalid duration: '{0}'")]
    InvalidDuration(String),

    #[error("Invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("No credentials configured")]
    EmptyCredentialPool,

    #[error("No credential configured for role {0}")]
    MissingCredential(Role),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Weighted selection needs at least one non-zero weight")]
    ZeroWeights,

    #[error("Invalid header name: {0}")]
    InvalidHeader(String),

    #[error("Token for role {0} is not a valid header value")]
    InvalidHeaderValue(Role),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Invalid query parameter {name}: {reason}")]
    InvalidQuery { name: String, reason: String },

    #[error("Unsupported executor: {0}")]
    UnsupportedExecutor(String),

    #[error("Missing scenario field: {0}")]
    MissingField(&'static str),

    #[error("Failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse scenario file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Role claimed by a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Moderator,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Moderator => "moderator",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "moderator" => Ok(Role::Moderator),
            "employee" => Ok(Role::Employee),
            other => Err(ConfigError::UnknownRole(other.to_string())),
        }
    }
}

/// Outcome of the single check evaluated per iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}
