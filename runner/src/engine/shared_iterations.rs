//! Closed-model engine: a fixed number of iterations shared by workers

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{Iteration, ScheduleOutcome, Scheduler};
use crate::scenario::LoadProfile;

pub(super) const NAME: &str = "shared-iterations";

/// Runs `iterations` in total with `max_workers` workers pulling from a
/// shared counter. New iterations stop starting once the profile's test
/// duration has elapsed.
#[derive(Debug, Clone)]
pub struct SharedIterations {
    iterations: u64,
}

impl SharedIterations {
    pub fn new(iterations: u64) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

#[async_trait]
impl Scheduler for SharedIterations {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn schedule(
        &self,
        iteration: Arc<dyn Iteration>,
        profile: &LoadProfile,
    ) -> ScheduleOutcome {
        let total = self.iterations;
        let workers = (profile.max_workers() as u64).min(total).max(1) as usize;
        let start = Instant::now();
        let deadline = start + profile.test_duration();

        let next = Arc::new(AtomicU64::new(0));
        let started = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicU64::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        info!(total, workers, "Starting shared iterations schedule");

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let iteration = iteration.clone();
            let next = next.clone();
            let started = started.clone();
            let completed = completed.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.spawn(async move {
                while Instant::now() < deadline {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        break;
                    }
                    started.fetch_add(1, Ordering::SeqCst);
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);

                    iteration.execute(index).await;

                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let drained = tokio::time::timeout_at(deadline + profile.graceful_stop(), async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let started = started.load(Ordering::SeqCst);
        let completed = completed.load(Ordering::SeqCst);
        let interrupted = started - completed;
        if interrupted > 0 {
            warn!(interrupted, "Graceful stop expired, aborted in-flight iterations");
        }

        ScheduleOutcome {
            started,
            completed,
            dropped: 0,
            interrupted,
            peak_workers: peak.load(Ordering::SeqCst),
            elapsed: start.elapsed(),
        }
    }
}
