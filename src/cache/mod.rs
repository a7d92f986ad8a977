//! Request cache subsystem.
//!
//! # Data Flow
//! ```text
//! subscription worker → coordinator.on_update → memory.rs put (replace)
//! coordinator.get_config (fast path) → memory.rs get
//! sweeper (deadline passed) → memory.rs get
//! ```
//!
//! # Design Decisions
//! - In-memory only, rebuilt on restart
//! - No TTL or eviction; a newer value replaces the older one
//! - Absence is a normal state, not an error

pub mod memory;

pub use memory::{CacheEntry, RequestCache};
