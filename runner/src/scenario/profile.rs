//! Load profile: arrival rate, duration and worker bounds

use std::time::Duration;

use super::types::ConfigError;

/// Grace period for in-flight iterations once the last one has started
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Declarative load profile for an open-model (arrival-rate) run.
///
/// Always validated on construction; never clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProfile {
    arrival_rate: u64,
    time_unit: Duration,
    test_duration: Duration,
    pre_allocated_workers: usize,
    max_workers: usize,
    graceful_stop: Duration,
}

impl LoadProfile {
    pub fn new(
        arrival_rate: u64,
        time_unit: Duration,
        test_duration: Duration,
        pre_allocated_workers: usize,
        max_workers: usize,
    ) -> Result<Self, ConfigError> {
        let profile = Self {
            arrival_rate,
            time_unit,
            test_duration,
            pre_allocated_workers,
            max_workers,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arrival_rate == 0 {
            return Err(ConfigError::ZeroArrivalRate);
        }
        if self.time_unit.is_zero() {
            return Err(ConfigError::ZeroDuration("timeUnit"));
        }
        if self.test_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("duration"));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroMaxWorkers);
        }
        if self.pre_allocated_workers > self.max_workers {
            return Err(ConfigError::WorkerBounds {
                pre_allocated: self.pre_allocated_workers,
                max: self.max_workers,
            });
        }
        Ok(())
    }

    pub fn arrival_rate(&self) -> u64 {
        self.arrival_rate
    }

    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }

    pub fn test_duration(&self) -> Duration {
        self.test_duration
    }

    pub fn pre_allocated_workers(&self) -> usize {
        self.pre_allocated_workers
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn graceful_stop(&self) -> Duration {
        self.graceful_stop
    }

    /// Gap between two consecutive iteration starts (at least 1ns)
    pub fn period(&self) -> Duration {
        let nanos = self.time_unit.as_nanos() / u128::from(self.arrival_rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX).max(1))
    }

    /// Number of iterations started over the whole test duration
    pub fn total_iterations(&self) -> u64 {
        let total = u128::from(self.arrival_rate) * self.test_duration.as_nanos()
            / self.time_unit.as_nanos();
        u64::try_from(total).unwrap_or(u64::MAX)
    }
}

/// Parse a duration such as `500ms`, `1s`, `2.5s`, `10m` or `1h`
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(invalid)?;
    let (value, unit) = s.split_at(split);
    let value: f64 = value.parse().map_err(|_| invalid())?;

    let secs = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 60.0 * 60.0,
        _ => return Err(invalid()),
    };

    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}
