//! Runtime configuration
//!
//! Configuration is loaded from environment variables and layered on top of
//! the scenario document: CLI flags override the environment, which
//! overrides the file.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::scenario::{Role, ScenarioFile};

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "pvz_load=info";

/// Main runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Scenario document path; the built-in scenario when unset
    pub scenario_file: Option<PathBuf>,
    /// Base URL of the service under test
    pub base_url: Option<String>,
    /// Per-request timeout
    pub http_timeout: Option<Duration>,
    /// Token overrides per role
    pub moderator_token: Option<String>,
    pub employee_token: Option<String>,
    /// Prometheus exporter listen address
    pub metrics_addr: Option<SocketAddr>,
    /// Where to write the JSON report
    pub summary_export: Option<PathBuf>,
    /// Tracing filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scenario_file: None,
            base_url: None,
            http_timeout: None,
            moderator_token: None,
            employee_token: None,
            metrics_addr: None,
            summary_export: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(path) = non_empty("SCENARIO_FILE") {
            config.scenario_file = Some(PathBuf::from(path));
        }
        if let Some(url) = non_empty("TARGET_BASE_URL") {
            config.base_url = Some(url);
        }
        if let Some(val) = non_empty("HTTP_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
            && secs > 0
        {
            config.http_timeout = Some(Duration::from_secs(secs));
        }

        // Tokens
        config.moderator_token = non_empty("MODERATOR_TOKEN");
        config.employee_token = non_empty("EMPLOYEE_TOKEN");

        // Outputs
        if let Some(val) = non_empty("METRICS_ADDR")
            && let Ok(addr) = val.parse()
        {
            config.metrics_addr = Some(addr);
        }
        if let Some(path) = non_empty("SUMMARY_EXPORT") {
            config.summary_export = Some(PathBuf::from(path));
        }
        if let Some(filter) = non_empty("RUST_LOG") {
            config.log_filter = filter;
        }

        config
    }

    /// Apply environment overrides to a scenario document
    pub fn apply(&self, file: &mut ScenarioFile) {
        if let Some(ref url) = self.base_url {
            file.set_base_url(url.clone());
        }
        if let Some(timeout) = self.http_timeout {
            file.set_timeout(timeout);
        }
        if let Some(ref token) = self.moderator_token {
            file.set_token(Role::Moderator, token.clone());
        }
        if let Some(ref token) = self.employee_token {
            file.set_token(Role::Employee, token.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.scenario_file.is_none());
        assert!(config.base_url.is_none());
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("SCENARIO_FILE", "scenarios/smoke.json"),
            ("TARGET_BASE_URL", "http://pvz:8080"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("MODERATOR_TOKEN", "m"),
            ("METRICS_ADDR", "127.0.0.1:9000"),
            ("SUMMARY_EXPORT", "out.json"),
        ]));

        assert_eq!(
            config.scenario_file,
            Some(PathBuf::from("scenarios/smoke.json"))
        );
        assert_eq!(config.base_url.as_deref(), Some("http://pvz:8080"));
        assert_eq!(config.http_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.moderator_token.as_deref(), Some("m"));
        assert!(config.employee_token.is_none());
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(config.summary_export, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("HTTP_TIMEOUT_SECS", "soon"),
            ("METRICS_ADDR", "not-an-addr"),
            ("TARGET_BASE_URL", ""),
        ]));
        assert!(config.http_timeout.is_none());
        assert!(config.metrics_addr.is_none());
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_apply_overrides_scenario() {
        let config = Config::from_lookup(lookup(&[
            ("TARGET_BASE_URL", "http://pvz:8080"),
            ("EMPLOYEE_TOKEN", "e2"),
        ]));
        let mut file = ScenarioFile::builtin().unwrap();
        config.apply(&mut file);

        let loaded = file.into_scenario().unwrap();
        assert_eq!(
            loaded.config.target.url().unwrap().as_str(),
            "http://pvz:8080/pvz"
        );
        assert_eq!(
            loaded.config.credentials.get(Role::Employee).unwrap().token(),
            "e2"
        );
    }
}
