//! Engine configuration.
//!
//! The knobs the dispatch loop runs on: the scheduler poll interval, the
//! worker pool size, the per-project queue ceiling, and the per-handler
//! timeout. All values have defaults so an empty `[engine]` section is a
//! valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Validation failed.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Dispatch engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Scheduler tick interval in milliseconds. Deferred claims and
    /// externally posted claims are only observed on the next tick.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Size of the worker pool driving dispatch cycles. Independent of
    /// the number of projects: a project only ever occupies one slot.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Hard ceiling on outstanding claims per project queue.
    #[serde(default = "default_queue_ceiling")]
    pub queue_ceiling: usize,

    /// Upper bound on a single handler invocation, in seconds. A handler
    /// exceeding it is escalated as a hard failure so it cannot occupy a
    /// project's slot forever.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

impl EngineConfig {
    /// The scheduler tick interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The per-handler invocation timeout.
    #[must_use]
    pub const fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    /// Validates bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Validation(
                "workers must be greater than zero".to_string(),
            ));
        }
        if self.queue_ceiling == 0 {
            return Err(ConfigError::Validation(
                "queue_ceiling must be greater than zero".to_string(),
            ));
        }
        if self.handler_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "handler_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            workers: default_workers(),
            queue_ceiling: default_queue_ceiling(),
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_workers() -> usize {
    8
}

const fn default_queue_ceiling() -> usize {
    crate::claims::DEFAULT_QUEUE_CEILING
}

const fn default_handler_timeout_secs() -> u64 {
    60
}
