//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratio within (0, 1])
//! - Validate addresses and source URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    for (i, endpoint) in config.sources.endpoints.iter().enumerate() {
        match Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("sources.endpoints[{}]", i),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("sources.endpoints[{}]", i),
                format!("'{}' is not a URL: {}", endpoint, e),
            )),
        }
    }
    if config.sources.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("sources.probe_timeout_secs", "must be > 0"));
    }
    if config.sources.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("sources.connect_timeout_secs", "must be > 0"));
    }

    let timing = &config.timing;
    if timing.client_timeout_ms == 0 {
        errors.push(ValidationError::new("timing.client_timeout_ms", "must be > 0"));
    }
    if timing.client_timeout_ms > timing.max_client_timeout_ms {
        errors.push(ValidationError::new(
            "timing.client_timeout_ms",
            format!("must not exceed max_client_timeout_ms ({})", timing.max_client_timeout_ms),
        ));
    }
    if !(timing.upstream_timeout_ratio > 0.0 && timing.upstream_timeout_ratio <= 1.0) {
        errors.push(ValidationError::new(
            "timing.upstream_timeout_ratio",
            "must be within (0, 1]",
        ));
    }
    if timing.sweep_interval_ms == 0 {
        errors.push(ValidationError::new("timing.sweep_interval_ms", "must be > 0"));
    }

    if config.retries.base_delay_ms == 0 {
        errors.push(ValidationError::new("retries.base_delay_ms", "must be > 0"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", observability.log_format),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.sources.endpoints = vec!["ftp://cfg:21".into(), "::nope".into()];
        config.timing.client_timeout_ms = 400_000;
        config.observability.log_format = "xml".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "sources.endpoints[0]",
                "sources.endpoints[1]",
                "timing.client_timeout_ms",
                "observability.log_format",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
        assert!(errors[0].to_string().contains("nowhere"));
    }
}
