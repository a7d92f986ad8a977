//! Timing values derived from configuration.

use std::time::Duration;

use crate::config::TimingConfig;
use crate::error::ProxyError;

/// Resolved durations used by the coordinator, workers and sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingValues {
    /// Deadline applied when a request does not carry its own.
    pub client_timeout: Duration,
    /// Largest deadline a request may ask for.
    pub max_client_timeout: Duration,
    /// Budget for one upstream fetch, a fraction of the client timeout.
    pub upstream_budget: Duration,
    pub sweep_initial_delay: Duration,
    pub sweep_interval: Duration,
}

impl TimingValues {
    pub fn from_config(config: &TimingConfig) -> Self {
        Self {
            client_timeout: config.client_timeout(),
            max_client_timeout: config.max_client_timeout(),
            upstream_budget: config.upstream_budget(),
            sweep_initial_delay: config.sweep_initial_delay(),
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Resolve the timeout a request asked for.
    pub fn admit_timeout(&self, requested: Option<Duration>) -> Result<Duration, ProxyError> {
        match requested {
            None => Ok(self.client_timeout),
            Some(timeout) if timeout.is_zero() || timeout > self.max_client_timeout => {
                Err(ProxyError::InvalidTimeout {
                    requested_ms: timeout.as_millis() as u64,
                    max_ms: self.max_client_timeout.as_millis() as u64,
                })
            }
            Some(timeout) => Ok(timeout),
        }
    }
}

impl Default for TimingValues {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default())
    }
}
