//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the config proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Local listener for config clients.
    pub listener: ListenerConfig,

    /// Upstream configuration sources.
    pub sources: SourcesConfig,

    /// Client budget, upstream budget and sweep cadence.
    pub timing: TimingConfig,

    /// Backoff for transient upstream failures.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:19090").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:19090".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Upstream configuration source set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Base URLs of the upstream config servers (e.g., "http://cfg1:19071").
    pub endpoints: Vec<String>,

    /// Timeout for the startup connectivity probe in seconds.
    pub probe_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            probe_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Timing values for long-polling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Timeout clients use when they do not send one, in milliseconds.
    pub client_timeout_ms: u64,

    /// Largest timeout a client may ask for, in milliseconds.
    pub max_client_timeout_ms: u64,

    /// Fraction of the client timeout granted to each upstream fetch.
    /// Keeps the proxy answering before its clients give up.
    pub upstream_timeout_ratio: f64,

    /// Delay before the first timeout sweep, in milliseconds.
    pub sweep_initial_delay_ms: u64,

    /// Period between timeout sweeps, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            client_timeout_ms: 55_000,
            max_client_timeout_ms: 300_000,
            upstream_timeout_ratio: 0.8,
            sweep_initial_delay_ms: 5_000,
            sweep_interval_ms: 1_000,
        }
    }
}

impl TimingConfig {
    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    pub fn max_client_timeout(&self) -> Duration {
        Duration::from_millis(self.max_client_timeout_ms)
    }

    /// Bound for one upstream fetch: `client_timeout * upstream_timeout_ratio`.
    pub fn upstream_budget(&self) -> Duration {
        self.client_timeout().mul_f64(self.upstream_timeout_ratio)
    }

    pub fn sweep_initial_delay(&self) -> Duration {
        Duration::from_millis(self.sweep_initial_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Retry configuration for subscription workers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:19092".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for subscription workers to stop, in seconds.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period_secs: 10 }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert!(config.sources.endpoints.is_empty());
        assert_eq!(config.timing.sweep_interval(), Duration::from_secs(1));
        assert_eq!(config.timing.sweep_initial_delay(), Duration::from_secs(5));
        assert_eq!(config.shutdown.grace_period(), Duration::from_secs(10));
    }

    #[test]
    fn test_upstream_budget_is_fraction_of_client_timeout() {
        let timing = TimingConfig {
            client_timeout_ms: 10_000,
            ..TimingConfig::default()
        };
        assert_eq!(timing.upstream_budget(), Duration::from_millis(8_000));
    }

    #[test]
    fn test_partial_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [sources]
            endpoints = ["http://cfg1:19071", "http://cfg2:19071"]

            [timing]
            sweep_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.sources.endpoints.len(), 2);
        assert_eq!(config.sources.probe_timeout_secs, 30);
        assert_eq!(config.timing.sweep_interval_ms, 250);
        assert_eq!(config.timing.client_timeout_ms, 55_000);
        assert_eq!(config.listener.bind_address, "127.0.0.1:19090");
    }
}
