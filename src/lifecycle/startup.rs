//! Startup orchestration.

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::proxy::ProxyCoordinator;
use crate::upstream::{HttpUpstream, UpstreamError, UpstreamSource};

/// Build the HTTP upstream and start the proxy core on it.
pub async fn start(config: &ProxyConfig) -> Result<Arc<ProxyCoordinator<HttpUpstream>>, UpstreamError> {
    let upstream = Arc::new(HttpUpstream::new(&config.sources)?);
    Ok(start_with(upstream, config).await)
}

/// Start the proxy core on any upstream.
///
/// Sources are probed first; an unreachable upstream is logged and never fatal.
pub async fn start_with<U: UpstreamSource>(upstream: Arc<U>, config: &ProxyConfig) -> Arc<ProxyCoordinator<U>> {
    let sources = upstream.sources();
    if sources.is_empty() {
        tracing::warn!("No upstream config sources configured; requests will only be answered on timeout");
    } else {
        tracing::info!(sources = ?sources, "Probing upstream config sources");
        upstream.probe().await;
    }

    let coordinator = ProxyCoordinator::new(upstream, config);
    coordinator.start_sweeper();

    tracing::info!(
        client_timeout_ms = coordinator.timing().client_timeout.as_millis() as u64,
        upstream_budget_ms = coordinator.timing().upstream_budget.as_millis() as u64,
        sweep_interval_ms = coordinator.timing().sweep_interval.as_millis() as u64,
        "Config proxy core started"
    );
    coordinator
}
