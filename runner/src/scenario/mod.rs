//! Scenario definition and execution
//!
//! This module provides:
//! - `LoadProfile` for arrival rate, duration and worker bounds
//! - `CredentialPool` with static, round-robin and weighted selection
//! - `Target` for the `GET /pvz` request
//! - `ScenarioFile` for JSON scenario documents
//! - `ScenarioRunner` which runs the request-and-check iteration

mod credentials;
mod file;
mod profile;
mod runner;
mod target;
mod types;

pub use credentials::{
    CredentialPool, DEFAULT_AUTH_HEADER, DEFAULT_AUTH_SCHEME, RequestCredential,
    SelectionStrategy,
};
pub use file::{
    AuthSection, CredentialEntry, LoadedScenario, ScenarioFile, ScenarioSection, SelectionSection,
    TargetSection,
};
pub use profile::{DEFAULT_GRACEFUL_STOP, LoadProfile, parse_duration};
pub use runner::{ScenarioConfig, ScenarioRunner};
pub use target::Target;
pub use types::{CheckResult, ConfigError, Role};
