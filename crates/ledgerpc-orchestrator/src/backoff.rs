use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Cap on the total time a backoff keeps producing delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxElapsedTime {
    /// Stop once elapsed time plus the next delay would exceed the cap.
    Limited(Duration),
    /// Never stop.
    Unlimited,
}

/// Exponential backoff with optional jitter and an elapsed-time cap.
///
/// Delays start at `initial_interval` and grow by `multiplier` per step up to
/// `max_interval`. Elapsed time is measured from construction or the last
/// [`reset`](Self::reset), on the tokio clock so paused-time tests see it.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ledgerpc_orchestrator::{ExponentialBackoff, MaxElapsedTime};
///
/// let mut backoff = ExponentialBackoff::new(
///     Duration::from_millis(100),
///     Duration::from_millis(400),
///     MaxElapsedTime::Unlimited,
/// );
/// let delays: Vec<_> = backoff.by_ref().take(4).collect();
/// assert_eq!(delays, [100, 200, 400, 400].map(Duration::from_millis));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: MaxElapsedTime,
    pub multiplier: f64,
    /// Fraction of the current interval used as jitter, in `[0, 1]`.
    pub randomization_factor: f64,
    current_interval: Duration,
    start_time: Instant,
}

impl ExponentialBackoff {
    pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
    pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
    pub const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(15 * 60);
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;

    pub fn new(initial_interval: Duration, max_interval: Duration, max_elapsed_time: MaxElapsedTime) -> Self {
        let max_interval = max_interval.max(initial_interval);
        Self {
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier: Self::DEFAULT_MULTIPLIER,
            randomization_factor: 0.0,
            current_interval: initial_interval,
            start_time: Instant::now(),
        }
    }

    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_elapsed_time(mut self, max_elapsed_time: MaxElapsedTime) -> Self {
        self.max_elapsed_time = max_elapsed_time;
        self
    }

    /// Rewinds to the initial interval and restarts the elapsed-time clock.
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.start_time = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    /// The next delay, or `None` once the elapsed-time cap would be exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.randomize(self.current_interval).min(self.max_interval);

        if let MaxElapsedTime::Limited(max) = self.max_elapsed_time {
            if self.elapsed() + delay > max {
                return None;
            }
        }

        self.current_interval = self.grow(self.current_interval);
        Some(delay)
    }

    fn grow(&self, interval: Duration) -> Duration {
        Duration::try_from_secs_f64(interval.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    fn randomize(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::rng().random_range((secs - delta)..=(secs + delta));
        Duration::try_from_secs_f64(jittered).unwrap_or(interval)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_INITIAL_INTERVAL,
            Self::DEFAULT_MAX_INTERVAL,
            MaxElapsedTime::Limited(Self::DEFAULT_MAX_ELAPSED_TIME),
        )
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.next_backoff()
    }
}

/// Retry policy for request execution.
///
/// Durations are in milliseconds so the config reads naturally from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay after every node of a round failed.
    pub initial_backoff_ms: u64,
    /// Largest single delay.
    pub max_backoff_ms: u64,
    /// Attempts allowed per `execute` call, across all nodes.
    pub max_attempts: usize,
    /// Total time an `execute` call may keep backing off.
    pub request_timeout_ms: u64,
    /// Timeout applied to each individual call, if any.
    pub grpc_timeout_ms: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            max_backoff_ms: 8_000,
            max_attempts: 10,
            request_timeout_ms: 120_000,
            grpc_timeout_ms: None,
        }
    }
}

impl BackoffConfig {
    /// The backoff template for one `execute` call.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            MaxElapsedTime::Limited(self.request_timeout()),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn grpc_timeout(&self) -> Option<Duration> {
        self.grpc_timeout_ms.map(Duration::from_millis)
    }
}
