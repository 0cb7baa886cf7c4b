//! Scheduling engines that drive the iteration body
//!
//! The runner only sees the `Scheduler` trait; engines decide when and how
//! many iterations run concurrently.

mod arrival_rate;
mod shared_iterations;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::scenario::LoadProfile;

pub use arrival_rate::ConstantArrivalRate;
pub use shared_iterations::SharedIterations;

/// One unit of work executed by an engine worker
#[async_trait]
pub trait Iteration: Send + Sync + 'static {
    async fn execute(&self, index: u64);
}

/// What an engine did with the iterations it was asked to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub started: u64,
    pub completed: u64,
    /// Starts skipped because every worker was busy
    pub dropped: u64,
    /// In flight when the graceful stop expired
    pub interrupted: u64,
    pub peak_workers: usize,
    pub elapsed: Duration,
}

/// Engine interface: run `iteration` under `profile` until done
#[async_trait]
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn schedule(&self, iteration: Arc<dyn Iteration>, profile: &LoadProfile)
    -> ScheduleOutcome;
}

/// Executor selected by a scenario file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    ConstantArrivalRate,
    SharedIterations { iterations: u64 },
}

impl Executor {
    pub fn scheduler(&self) -> Box<dyn Scheduler> {
        match self {
            Executor::ConstantArrivalRate => Box::new(ConstantArrivalRate::new()),
            Executor::SharedIterations { iterations } => {
                Box::new(SharedIterations::new(*iterations))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Executor::ConstantArrivalRate => arrival_rate::NAME,
            Executor::SharedIterations { .. } => shared_iterations::NAME,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Iteration that sleeps for a fixed time and records what it saw
    #[derive(Default)]
    pub struct SleepIteration {
        pub sleep: Duration,
        pub runs: AtomicU64,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub indices: Mutex<Vec<u64>>,
    }

    impl SleepIteration {
        pub fn new(sleep: Duration) -> Arc<Self> {
            Arc::new(Self {
                sleep,
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl Iteration for SleepIteration {
        async fn execute(&self, index: u64) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.indices.lock().await.push(index);
            tokio::time::sleep(self.sleep).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }
}
