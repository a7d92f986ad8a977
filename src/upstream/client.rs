//! HTTP/JSON client for a set of upstream config servers.
//!
//! # Responsibilities
//! - Long-poll `POST {source}/config/v1/subscribe` for one identity at a time
//! - Fail over across the configured sources on transport errors
//! - Probe `GET {source}/state/v1/health` at startup, logging the result

use dashmap::DashSet;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::config::SourcesConfig;
use crate::model::{ConfigIdentity, ConfigValue};
use crate::observability::metrics;
use crate::upstream::{FetchRequest, UpstreamError, UpstreamSource};

/// Extra time granted to the HTTP exchange beyond the long-poll budget.
const TRANSFER_SLACK: Duration = Duration::from_secs(2);

/// Wire body of a subscribe call.
#[derive(Debug, Serialize)]
struct SubscribeBody<'a> {
    namespace: &'a str,
    name: &'a str,
    def_checksum: &'a str,
    generation: i64,
    content_checksum: &'a str,
    timeout_ms: u64,
}

/// Upstream client with failover across config servers.
#[derive(Debug)]
pub struct HttpUpstream {
    client: reqwest::Client,
    endpoints: Vec<Url>,
    /// Index of the source currently preferred.
    current: AtomicUsize,
    open: DashSet<ConfigIdentity>,
    probe_timeout: Duration,
    closed: AtomicBool,
}

impl HttpUpstream {
    /// Create a client for the configured sources.
    ///
    /// The starting source is picked at random so proxies spread their load.
    pub fn new(config: &SourcesConfig) -> Result<Self, UpstreamError> {
        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let url = Url::parse(endpoint).map_err(|e| UpstreamError::Transport {
                endpoint: endpoint.clone(),
                message: format!("invalid source URL: {}", e),
            })?;
            endpoints.push(url);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Transport {
                endpoint: "client".to_string(),
                message: e.to_string(),
            })?;

        let start = if endpoints.is_empty() {
            0
        } else {
            fastrand::usize(..endpoints.len())
        };

        Ok(Self {
            client,
            endpoints,
            current: AtomicUsize::new(start),
            open: DashSet::new(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            closed: AtomicBool::new(false),
        })
    }

    fn endpoint_url(base: &Url, path: &str) -> String {
        format!("{}/{}", base.as_str().trim_end_matches('/'), path)
    }

    /// Sources in the order to try them, starting with the preferred one.
    fn rotation(&self) -> impl Iterator<Item = (usize, &Url)> + '_ {
        let len = self.endpoints.len();
        let start = self.current.load(Ordering::Relaxed);
        (0..len).map(move |offset| {
            let idx = (start + offset) % len;
            (idx, &self.endpoints[idx])
        })
    }

    async fn fetch_from(
        &self,
        base: &Url,
        request: &FetchRequest,
    ) -> Result<ConfigValue, UpstreamError> {
        let url = Self::endpoint_url(base, "config/v1/subscribe");
        let body = SubscribeBody {
            namespace: request.identity.namespace(),
            name: request.identity.name(),
            def_checksum: request.identity.def_checksum(),
            generation: request.known.generation,
            content_checksum: &request.known.content_checksum,
            timeout_ms: request.timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout + TRANSFER_SLACK)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(request.timeout)
                } else {
                    UpstreamError::Transport {
                        endpoint: base.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        match response.status() {
            status if status.is_success() => {
                response.json::<ConfigValue>().await.map_err(|e| UpstreamError::Transport {
                    endpoint: base.to_string(),
                    message: format!("invalid response body: {}", e),
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                let reason = response.text().await.unwrap_or_default();
                Err(UpstreamError::Configuration {
                    identity: request.identity.to_string(),
                    reason,
                })
            }
            status => Err(UpstreamError::Transport {
                endpoint: base.to_string(),
                message: format!("unexpected status {}", status),
            }),
        }
    }
}

impl UpstreamSource for HttpUpstream {
    fn open(&self, identity: &ConfigIdentity) -> Result<(), UpstreamError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(UpstreamError::Cancelled);
        }
        if self.endpoints.is_empty() {
            return Err(UpstreamError::NoSources);
        }
        self.open.insert(identity.clone());
        Ok(())
    }

    async fn fetch(&self, request: FetchRequest) -> Result<ConfigValue, UpstreamError> {
        if self.closed.load(Ordering::Acquire) || !self.open.contains(&request.identity) {
            return Err(UpstreamError::Cancelled);
        }

        let mut last_error = UpstreamError::NoSources;
        for (idx, base) in self.rotation() {
            match self.fetch_from(base, &request).await {
                Ok(value) => {
                    self.current.store(idx, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e @ UpstreamError::Transport { .. }) => {
                    tracing::warn!(source = %base, identity = %request.identity, error = %e, "Upstream error, trying next source");
                    last_error = e;
                }
                Err(e) => {
                    // Timeouts are not retried against other sources; the budget is spent.
                    if matches!(e, UpstreamError::Timeout(_)) {
                        self.current.store((idx + 1) % self.endpoints.len(), Ordering::Relaxed);
                    }
                    return Err(e);
                }
            }
        }
        Err(last_error)
    }

    fn cancel(&self, identity: &ConfigIdentity) {
        if self.open.remove(identity).is_some() {
            tracing::debug!(identity = %identity, "Released upstream subscription");
        }
    }

    async fn probe(&self) {
        if self.endpoints.is_empty() {
            tracing::warn!("No config sources defined, could not check connection");
            return;
        }

        for base in &self.endpoints {
            let url = Self::endpoint_url(base, "state/v1/health");
            let healthy = match timeout(self.probe_timeout, self.client.get(&url).send()).await {
                Ok(Ok(response)) if response.status().is_success() => true,
                Ok(Ok(response)) => {
                    tracing::info!(source = %base, status = %response.status(), "Config source answered probe with non-success status");
                    false
                }
                Ok(Err(e)) => {
                    tracing::info!(source = %base, error = %e, "Could not connect to config source");
                    false
                }
                Err(_) => {
                    tracing::info!(source = %base, "Config source probe timed out");
                    false
                }
            };
            metrics::record_source_health(base.as_str(), healthy);
            if healthy {
                tracing::debug!(source = %base, "Created connection to config source");
                return;
            }
        }

        tracing::info!(
            sources = ?self.sources(),
            "Could not connect to any config source, please make sure config server(s) are running"
        );
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.open.clear();
        tracing::debug!("Upstream connections closed");
    }

    fn sources(&self) -> Vec<String> {
        self.endpoints.iter().map(|u| u.to_string()).collect()
    }
}
