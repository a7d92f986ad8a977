//! Host-local configuration long-poll proxy.
//!
//! Many local clients ask for the same configurations; the proxy keeps one
//! upstream subscription per configuration, answers from its cache when it can,
//! and otherwise holds each request until the configuration changes or the
//! request's deadline passes. Every admitted request gets exactly one reply.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod pending;
pub mod proxy;
pub mod resilience;
pub mod rpc;
pub mod subscription;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use lifecycle::shutdown::Shutdown;
pub use model::{ConfigIdentity, ConfigValue, KnownConfig};
pub use proxy::{Admission, ConfigRequest, ProxyCoordinator};
pub use upstream::{HttpUpstream, UpstreamError, UpstreamSource};
