//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build upstream → Probe sources (non-fatal) → Coordinator → Sweeper
//!
//! Shutdown (shutdown.rs + ProxyCoordinator::shutdown):
//!     Signal → Stop accepting → Stop sweeper → Cancel subscriptions
//!            → Await workers (grace period) → Close upstream → Answer remaining requests
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Upstream reachability never blocks startup
//! - Every held request is answered before the process exits

pub mod shutdown;
pub mod signals;
pub mod startup;
