//! Engine configuration.

use crate::state::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a manual step may wait for its trigger. `None` waits
    /// forever. An expired step fails with output `"trigger expired"`.
    #[serde(default)]
    pub trigger_timeout_seconds: Option<f64>,
    /// Upper bound on action handlers running at once across all builds.
    /// Steps waiting for a trigger do not count. `None` is unbounded.
    #[serde(default)]
    pub max_concurrent_actions: Option<usize>,
    /// Retry policy for build state writes.
    #[serde(default)]
    pub store_retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_timeout_seconds: None,
            max_concurrent_actions: None,
            store_retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trigger timeout.
    #[must_use]
    pub fn with_trigger_timeout(mut self, seconds: f64) -> Self {
        self.trigger_timeout_seconds = Some(seconds);
        self
    }

    /// Caps concurrently running actions.
    #[must_use]
    pub fn with_max_concurrent_actions(mut self, limit: usize) -> Self {
        self.max_concurrent_actions = Some(limit.max(1));
        self
    }

    /// Sets the store retry policy.
    #[must_use]
    pub fn with_store_retry(mut self, retry: RetryConfig) -> Self {
        self.store_retry = retry;
        self
    }

    /// The trigger timeout as a duration. Non-positive values and values
    /// too large for a [`Duration`] disable the timeout.
    #[must_use]
    pub fn trigger_timeout(&self) -> Option<Duration> {
        self.trigger_timeout_seconds
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
