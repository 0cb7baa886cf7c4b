//! pvz-load library
//!
//! Load harness for the PVZ listing endpoint. The binary wires these pieces
//! together; integration tests drive them directly.

pub mod config;
pub mod engine;
pub mod report;
pub mod scenario;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use engine::{ConstantArrivalRate, Executor, Scheduler, SharedIterations};
pub use report::RunReport;
pub use scenario::{ConfigError, LoadProfile, ScenarioConfig, ScenarioFile, ScenarioRunner};
pub use transport::{HttpTransport, ReqwestTransport};
