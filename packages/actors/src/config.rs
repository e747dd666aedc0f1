//! Engine tuning knobs.

use std::time::Duration;

/// Exponential backoff between attempts while the render engine is down.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Delay before retry number `attempt` (1-based), clamped to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            let next_ms = (delay.as_millis() as f64 * self.multiplier) as u64;
            delay = Duration::from_millis(next_ms).min(self.max_delay);
        }
        delay.min(self.max_delay)
    }
}

/// Configuration for the job engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How long the reachability check may take before the render engine
    /// counts as unavailable.
    pub reachability_timeout: Duration,
    /// Consecutive `Unavailable` renders after which the job fails.
    pub max_unavailable_retries: u32,
    pub backoff: BackoffConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reachability_timeout: Duration::from_secs(5),
            max_unavailable_retries: 5,
            backoff: BackoffConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }

    pub fn with_max_unavailable_retries(mut self, retries: u32) -> Self {
        self.max_unavailable_retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}
