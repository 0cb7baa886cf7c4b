//! Open-model engine: starts iterations at a fixed rate

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Iteration, ScheduleOutcome, Scheduler};
use crate::scenario::LoadProfile;

pub(super) const NAME: &str = "constant-arrival-rate";

/// Starts `rate` iterations per `time_unit` regardless of how long earlier
/// iterations take.
///
/// A start that finds all `max_workers` busy is dropped, never queued.
#[derive(Debug, Clone, Default)]
pub struct ConstantArrivalRate;

impl ConstantArrivalRate {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scheduler for ConstantArrivalRate {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn schedule(
        &self,
        iteration: Arc<dyn Iteration>,
        profile: &LoadProfile,
    ) -> ScheduleOutcome {
        let total = profile.total_iterations();
        let period = profile.period();
        let pre_allocated = profile.pre_allocated_workers();

        let workers = Arc::new(Semaphore::new(profile.max_workers()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicU64::new(0));
        let mut peak = 0usize;
        let mut started = 0u64;
        let mut dropped = 0u64;
        let mut warned = false;

        info!(
            total,
            period_us = period.as_micros() as u64,
            max_workers = profile.max_workers(),
            "Starting constant arrival rate schedule"
        );

        let start = Instant::now();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut tasks = JoinSet::new();

        for index in 0..total {
            ticker.tick().await;

            // Reap finished iterations so the set stays small
            while tasks.try_join_next().is_some() {}

            let Ok(permit) = workers.clone().try_acquire_owned() else {
                dropped += 1;
                debug!(index, "No free worker, dropping iteration");
                continue;
            };

            started += 1;
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak = peak.max(now);
            if now > pre_allocated && !warned {
                warn!(
                    pre_allocated,
                    in_flight = now,
                    "Insufficient pre-allocated workers, growing towards max"
                );
                warned = true;
            }

            let iteration = iteration.clone();
            let in_flight = in_flight.clone();
            let completed = completed.clone();
            tasks.spawn(async move {
                iteration.execute(index).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                drop(permit);
            });
        }

        let drained = tokio::time::timeout(profile.graceful_stop(), async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        // Read after the aborted set is drained so late finishers count
        let completed = completed.load(Ordering::SeqCst);
        let interrupted = started - completed;
        if interrupted > 0 {
            warn!(interrupted, "Graceful stop expired, aborted in-flight iterations");
        }

        ScheduleOutcome {
            started,
            completed,
            dropped,
            interrupted,
            peak_workers: peak,
            elapsed: start.elapsed(),
        }
    }
}
