//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for production)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every log event carries the config identity it concerns
//! - Metrics are cheap (atomic increments); without an installed recorder they are no-ops
//! - `RUST_LOG` always wins over the configured level

pub mod logging;
pub mod metrics;
