//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_proxy_requests_total` (counter): admissions by outcome (immediate, deferred, rejected)
//! - `config_proxy_replies_total` (counter): replies by path (fast, update, sweep, shutdown)
//! - `config_proxy_claim_races_total` (counter): lost claims by path
//! - `config_proxy_pending_requests` (gauge): requests currently held
//! - `config_proxy_subscriptions` (gauge): live upstream subscriptions
//! - `config_proxy_cache_entries` (gauge): identities in the request cache
//! - `config_proxy_upstream_errors_total` (counter): upstream failures by kind
//! - `config_proxy_source_health` (gauge): 1=reachable, 0=unreachable, per source

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime. Failure is logged, never fatal.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    counter!("config_proxy_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_reply(path: &'static str) {
    counter!("config_proxy_replies_total", "path" => path).increment(1);
}

pub fn record_claim_race(path: &'static str) {
    counter!("config_proxy_claim_races_total", "path" => path).increment(1);
}

pub fn record_pending(count: usize) {
    gauge!("config_proxy_pending_requests").set(count as f64);
}

pub fn record_subscriptions(count: usize) {
    gauge!("config_proxy_subscriptions").set(count as f64);
}

pub fn record_cache_size(count: usize) {
    gauge!("config_proxy_cache_entries").set(count as f64);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("config_proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_source_health(source: &str, healthy: bool) {
    gauge!("config_proxy_source_health", "source" => source.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
