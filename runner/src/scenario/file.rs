//! JSON scenario documents
//!
//! A document holds one scenario, per-metric threshold lists, the target
//! and the auth setup.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::credentials::{
    CredentialPool, DEFAULT_AUTH_HEADER, DEFAULT_AUTH_SCHEME, RequestCredential,
    SelectionStrategy,
};
use super::profile::{LoadProfile, parse_duration};
use super::runner::ScenarioConfig;
use super::target::{DEFAULT_BASE_URL, DEFAULT_EXPECTED_STATUS, DEFAULT_PATH, Target};
use super::types::{ConfigError, Role};
use crate::engine::Executor;
use crate::stats::Threshold;
use crate::transport::DEFAULT_REQUEST_TIMEOUT;

/// Scenario used when no file is given: 1000 req/s for 30s
const BUILTIN_SCENARIO: &str = include_str!("../../scenarios/pvz.json");

const CONSTANT_ARRIVAL_RATE: &str = "constant-arrival-rate";
const SHARED_ITERATIONS: &str = "shared-iterations";
const DEFAULT_MAX_DURATION: &str = "10m";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFile {
    pub scenario: ScenarioSection,
    #[serde(default)]
    pub thresholds: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub target: TargetSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSection {
    #[serde(default = "default_scenario_name")]
    pub name: String,
    pub executor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(
        rename = "preAllocatedVUs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pre_allocated_vus: Option<usize>,
    #[serde(rename = "maxVUs", default, skip_serializing_if = "Option::is_none")]
    pub max_vus: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vus: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_stop: Option<String>,
}

fn default_scenario_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, String>,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_expected_status() -> u16 {
    DEFAULT_EXPECTED_STATUS
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_path(),
            query: IndexMap::new(),
            expected_status: DEFAULT_EXPECTED_STATUS,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSection {
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
    #[serde(default)]
    pub selection: SelectionSection,
}

fn default_header() -> String {
    DEFAULT_AUTH_HEADER.to_string()
}

fn default_scheme() -> String {
    DEFAULT_AUTH_SCHEME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum SelectionSection {
    Static {
        role: Role,
    },
    RoundRobin,
    Weighted {
        weights: IndexMap<String, u32>,
        #[serde(default)]
        seed: u64,
    },
}

impl Default for SelectionSection {
    fn default() -> Self {
        SelectionSection::Static {
            role: Role::Moderator,
        }
    }
}

impl SelectionSection {
    fn into_strategy(self) -> Result<SelectionStrategy, ConfigError> {
        Ok(match self {
            SelectionSection::Static { role } => SelectionStrategy::Static(role),
            SelectionSection::RoundRobin => SelectionStrategy::RoundRobin,
            SelectionSection::Weighted { weights, seed } => SelectionStrategy::Weighted {
                weights: weights
                    .into_iter()
                    .map(|(role, weight)| Ok((role.parse::<Role>()?, weight)))
                    .collect::<Result<_, ConfigError>>()?,
                seed,
            },
        })
    }
}

/// A scenario file turned into validated runtime configuration
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub config: ScenarioConfig,
    pub executor: Executor,
}

impl ScenarioFile {
    /// The built-in PVZ scenario
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_SCENARIO)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading scenario file {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.target.base_url = base_url.into();
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.target.timeout = Some(format!("{}ms", timeout.as_millis()));
    }

    /// Replace the token for `role`, adding the credential if missing
    pub fn set_token(&mut self, role: Role, token: impl Into<String>) {
        let token = token.into();
        match self.auth.credentials.iter_mut().find(|c| c.role == role) {
            Some(entry) => entry.token = token,
            None => self.auth.credentials.push(CredentialEntry { role, token }),
        }
    }

    /// Validate everything and build the runtime configuration
    pub fn into_scenario(self) -> Result<LoadedScenario, ConfigError> {
        let (profile, executor) = self.scenario.profile()?;

        let thresholds = self
            .thresholds
            .iter()
            .flat_map(|(metric, predicates)| {
                predicates.iter().map(move |p| Threshold::parse(metric, p))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout = match &self.target.timeout {
            Some(t) => parse_duration(t)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        let target = Target {
            base_url: self.target.base_url,
            path: self.target.path,
            query: self.target.query,
            expected_status: self.target.expected_status,
            timeout,
        };
        target.url()?;

        let header = self.auth.header;
        let scheme = self.auth.scheme;
        let credentials = CredentialPool::new(
            self.auth.credentials.into_iter().map(|entry| {
                RequestCredential::new(header.clone(), entry.token, entry.role)
                    .with_scheme(scheme.clone())
            }),
            self.auth.selection.into_strategy()?,
        )?;

        Ok(LoadedScenario {
            config: ScenarioConfig {
                name: self.scenario.name,
                profile,
                thresholds,
                target,
                credentials,
            },
            executor,
        })
    }
}

impl ScenarioSection {
    fn profile(&self) -> Result<(LoadProfile, Executor), ConfigError> {
        let (profile, executor) = match self.executor.as_str() {
            CONSTANT_ARRIVAL_RATE => {
                let rate = self.rate.ok_or(ConfigError::MissingField("rate"))?;
                let time_unit = parse_duration(self.time_unit.as_deref().unwrap_or("1s"))?;
                let duration = parse_duration(
                    self.duration
                        .as_deref()
                        .ok_or(ConfigError::MissingField("duration"))?,
                )?;
                let pre = self
                    .pre_allocated_vus
                    .ok_or(ConfigError::MissingField("preAllocatedVUs"))?;
                let max = self.max_vus.unwrap_or(pre);
                (
                    LoadProfile::new(rate, time_unit, duration, pre, max)?,
                    Executor::ConstantArrivalRate,
                )
            }
            SHARED_ITERATIONS => {
                let vus = self.vus.unwrap_or(1);
                let iterations = self.iterations.unwrap_or(1);
                let max_duration =
                    parse_duration(self.duration.as_deref().unwrap_or(DEFAULT_MAX_DURATION))?;
                // Nominal rate: all iterations spread over the max duration
                (
                    LoadProfile::new(iterations, max_duration, max_duration, vus, vus)?,
                    Executor::SharedIterations { iterations },
                )
            }
            other => return Err(ConfigError::UnsupportedExecutor(other.to_string())),
        };

        let profile = match &self.graceful_stop {
            Some(g) => profile.with_graceful_stop(parse_duration(g)?),
            None => profile,
        };
        Ok((profile, executor))
    }
}
