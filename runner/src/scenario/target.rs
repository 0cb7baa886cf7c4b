//! Target endpoint: `GET <base-url>/pvz` with optional listing filters

use chrono::DateTime;
use indexmap::IndexMap;
use reqwest::Url;
use std::time::Duration;

use super::types::ConfigError;
use crate::transport::DEFAULT_REQUEST_TIMEOUT;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PATH: &str = "/pvz";
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Page size bounds accepted by the PVZ listing
const MAX_LIMIT: u32 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub base_url: String,
    pub path: String,
    pub query: IndexMap<String, String>,
    pub expected_status: u16,
    pub timeout: Duration,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: DEFAULT_PATH.to_string(),
            query: IndexMap::new(),
            expected_status: DEFAULT_EXPECTED_STATUS,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Target {
    /// Name of the single check evaluated per iteration
    pub fn check_name(&self) -> String {
        format!("status is {}", self.expected_status)
    }

    /// Build and validate the full request URL
    pub fn url(&self) -> Result<Url, ConfigError> {
        self.validate_query()?;
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("timeout"));
        }

        let base = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidTarget(format!("{}: {}", self.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidTarget(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }

        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| ConfigError::InvalidTarget(format!("{}: {}", joined, e)))?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn validate_query(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, reason: &str| ConfigError::InvalidQuery {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        // Empty page or limit means the service default
        if let Some(page) = self.query.get("page").filter(|v| !v.is_empty()) {
            match page.parse::<u32>() {
                Ok(p) if p >= 1 => {}
                _ => return Err(invalid("page", "must be an integer >= 1")),
            }
        }
        if let Some(limit) = self.query.get("limit").filter(|v| !v.is_empty()) {
            match limit.parse::<u32>() {
                Ok(l) if (1..=MAX_LIMIT).contains(&l) => {}
                _ => return Err(invalid("limit", "must be an integer within 1-30")),
            }
        }

        let mut bounds = [None, None];
        for (slot, name) in bounds.iter_mut().zip(["startDate", "endDate"]) {
            if let Some(value) = self.query.get(name) {
                let parsed = DateTime::parse_from_rfc3339(value)
                    .map_err(|_| invalid(name, "must be an RFC 3339 timestamp"))?;
                *slot = Some(parsed);
            }
        }
        if let [Some(start), Some(end)] = bounds
            && start >= end
        {
            return Err(invalid("startDate", "must be before endDate"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_with(query: &[(&str, &str)]) -> Target {
        Target {
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Target::default()
        }
    }

    #[test]
    fn test_default_url() {
        let target = Target::default();
        assert_eq!(target.url().unwrap().as_str(), "http://localhost:8080/pvz");
        assert_eq!(target.check_name(), "status is 200");
    }

    #[test]
    fn test_slashes_are_normalized() {
        let target = Target {
            base_url: "http://example.test:9000/".to_string(),
            path: "pvz".to_string(),
            ..Target::default()
        };
        assert_eq!(target.url().unwrap().as_str(), "http://example.test:9000/pvz");
    }

    #[test]
    fn test_query_is_appended_in_order() {
        let target = target_with(&[("page", "2"), ("limit", "30")]);
        assert_eq!(
            target.url().unwrap().as_str(),
            "http://localhost:8080/pvz?page=2&limit=30"
        );
    }

    #[test]
    fn test_invalid_pagination_rejected() {
        for (name, value) in [("page", "0"), ("page", "abc"), ("limit", "31"), ("limit", "0")] {
            let err = target_with(&[(name, value)]).url().unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidQuery { name: n, .. } if n == name),
                "{name}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_pagination_uses_service_default() {
        let target = target_with(&[("page", ""), ("limit", "")]);
        assert_eq!(
            target.url().unwrap().as_str(),
            "http://localhost:8080/pvz?page=&limit="
        );
    }

    #[test]
    fn test_date_range_validation() {
        assert!(
            target_with(&[
                ("startDate", "2025-01-01T00:00:00Z"),
                ("endDate", "2025-02-01T00:00:00Z")
            ])
            .url()
            .is_ok()
        );
        assert!(
            target_with(&[
                ("startDate", "2025-02-01T00:00:00Z"),
                ("endDate", "2025-01-01T00:00:00Z")
            ])
            .url()
            .is_err()
        );
        assert!(target_with(&[("endDate", "yesterday")]).url().is_err());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let target = Target {
            base_url: "not a url".to_string(),
            ..Target::default()
        };
        assert!(matches!(target.url(), Err(ConfigError::InvalidTarget(_))));

        let target = Target {
            base_url: "ftp://localhost".to_string(),
            ..Target::default()
        };
        assert!(matches!(target.url(), Err(ConfigError::InvalidTarget(_))));
    }
}
