//! Waiter configuration

use crate::error::InvalidWaiterConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff and deadline settings for a [`crate::ConvergenceWaiter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaiterConfig {
    /// Delay before the second poll
    #[serde(with = "duration_ms", default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    #[serde(with = "duration_ms", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Growth factor between delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Overall bound on the wait, measured from the first poll
    #[serde(with = "duration_ms", default = "default_deadline")]
    pub deadline: Duration,

    /// Scale each delay by a random factor in `[0.5, 1.5)`
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            deadline: default_deadline(),
            jitter: true,
        }
    }
}

impl WaiterConfig {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Reject settings the backoff loop cannot make progress with
    pub fn validate(&self) -> Result<(), InvalidWaiterConfig> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(InvalidWaiterConfig(format!(
                "multiplier must be a finite number of at least 1, got {}",
                self.multiplier
            )));
        }
        if self.initial_delay.is_zero() || self.max_delay.is_zero() {
            return Err(InvalidWaiterConfig("delays must be positive".to_string()));
        }
        if self.max_delay < self.initial_delay {
            return Err(InvalidWaiterConfig(
                "max_delay must not be shorter than initial_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Fast, deterministic settings for tests and local substrates
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            deadline: Duration::from_secs(5),
            jitter: false,
        }
    }
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_deadline() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

/// Serde helper for Duration as milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
