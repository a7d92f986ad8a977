//! Upstream configuration sources.
//!
//! # Data Flow
//! ```text
//! SubscriptionManager
//!     → open (once, synchronous, may refuse the identity)
//!     → worker loop: fetch (long-poll, bounded by the upstream budget)
//!     → cancel (worker exit)
//!
//! Startup: probe every source, log only
//! Shutdown: close after all workers stopped
//! ```
//!
//! # Design Decisions
//! - The proxy core depends only on the `UpstreamSource` trait
//! - Transport and timeout failures are transient; configuration failures end a subscription
//! - Every fetch carries its own timeout; nothing here blocks unboundedly

pub mod client;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::model::{ConfigIdentity, ConfigValue, KnownConfig};

pub use client::HttpUpstream;

/// Errors returned by an upstream source.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Connection or protocol failure talking to a source.
    #[error("transport error from {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The source did not answer within the budget.
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    /// The source refused the identity (unknown definition, bad request).
    #[error("configuration error for {identity}: {reason}")]
    Configuration { identity: String, reason: String },

    /// No upstream sources are configured.
    #[error("no upstream config sources configured")]
    NoSources,

    /// No worker could be started for the subscription.
    #[error("no runtime available to run subscription worker")]
    WorkerUnavailable,

    /// The source answered with a generation older than one already seen.
    #[error("stale generation {generation} (already at {baseline})")]
    Stale { generation: i64, baseline: i64 },

    /// The subscription or the source was shut down.
    #[error("upstream subscription cancelled")]
    Cancelled,
}

impl UpstreamError {
    /// Transient errors are retried by the subscription worker.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transport { .. } | UpstreamError::Timeout(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Transport { .. } => "transport",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Configuration { .. } => "configuration",
            UpstreamError::NoSources => "no_sources",
            UpstreamError::WorkerUnavailable => "worker_unavailable",
            UpstreamError::Stale { .. } => "stale",
            UpstreamError::Cancelled => "cancelled",
        }
    }
}

/// One long-poll round against upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub identity: ConfigIdentity,
    /// Latest value the subscription has seen; upstream answers when it changes.
    pub known: KnownConfig,
    /// Upstream answers no later than this, changed or not.
    pub timeout: Duration,
}

/// A source of configuration the proxy subscribes to.
pub trait UpstreamSource: Send + Sync + 'static {
    /// Initial subscribe call for `identity`. Must not block.
    fn open(&self, identity: &ConfigIdentity) -> Result<(), UpstreamError>;

    /// Wait for a value newer than `request.known`, or return the current one
    /// once `request.timeout` elapses.
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<ConfigValue, UpstreamError>> + Send;

    /// Release upstream resources held for `identity`.
    fn cancel(&self, identity: &ConfigIdentity);

    /// Best-effort connectivity check. Logs only.
    fn probe(&self) -> impl Future<Output = ()> + Send;

    /// Close connections. Called once, after every worker has stopped.
    fn close(&self) {}

    /// Configured source addresses, for introspection.
    fn sources(&self) -> Vec<String>;
}
