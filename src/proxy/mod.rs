//! The long-poll delivery engine.
//!
//! # Data Flow
//! ```text
//! get_config
//!     → admit (identity, timeout) ──invalid──→ Rejected
//!     → pending.add
//!     → cache hit that differs from what the client holds → claim → Immediate
//!     → otherwise ensure subscription → Deferred
//!
//! worker → on_update(value)
//!     → cache.put
//!     → pending.matching snapshot → claim each satisfied request → reply
//!
//! sweeper tick → pending.for_each_expired → reply from cache or error sentinel
//! ```
//!
//! # Design Decisions
//! - `PendingRequestSet::claim` is the only arbiter between the three reply paths
//! - The pending entry is registered before the cache lookup so an update racing
//!   the lookup still finds it
//! - `on_update` stores into the cache before snapshotting pending requests, so a
//!   request admitted between the two steps is served by its own fast path

pub mod coordinator;
pub mod sweeper;
pub mod timing;

pub use coordinator::{Admission, ConfigRequest, ProxyCoordinator, ProxyStatus};
pub use sweeper::{SweeperHandle, TimeoutSweeper};
pub use timing::TimingValues;
