//! Upstream subscription subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator.get_config (no usable cache entry)
//!     → manager.rs ensure_subscription (one per identity, registry check-then-register)
//!     → upstream.open (synchronous; failure = never registered)
//!     → subscriber.rs worker loop:
//!         fetch (bounded) → listener.on_update(value) → fetch with new baseline → ...
//!     → on cancel or unrecoverable error: Cancelled, deregistered
//! ```
//!
//! # States
//! ```text
//! Created → Subscribing → Active ─┐
//!    │           │          ↑     │ (next fetch)
//!    │           │          └─────┘
//!    └───────────┴──────────┴────→ Cancelled (terminal)
//! ```
//!
//! # Design Decisions
//! - The registry is a sharded map; `entry` gives per-identity atomic registration
//!   without serializing unrelated identities
//! - A worker only removes its own registry entry, so a fresh subscription is never torn down
//! - Workers observe cancellation while fetching and while backing off

pub mod manager;
pub mod state;
pub mod subscriber;

pub use manager::{EnsureOutcome, SubscriptionInfo, SubscriptionManager};
pub use state::SubscriptionState;
pub use subscriber::{Subscription, UpdateListener, WorkerSettings};
