//! Local HTTP frontend.
//!
//! # Data Flow
//! ```text
//! POST /config/v1/get
//!     → GetConfigBody → ConfigRequest + oneshot reply handle
//!     → coordinator.get_config
//!         Immediate → 200 value
//!         Deferred  → await the oneshot → 200 value (error flag set if nothing better)
//!         Rejected  → 400 (503 while shutting down)
//!
//! GET /status → ProxyStatus
//! GET /cache  → cache entries
//! ```
//!
//! # Design Decisions
//! - A thin adapter: no proxy state lives here
//! - Long-poll handlers hold no locks while waiting on their reply

pub mod server;

pub use server::{router, serve, GetConfigBody};
