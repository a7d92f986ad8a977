//! Held ("pending") client requests.
//!
//! # Data Flow
//! ```text
//! get_config → request.rs (PendingRequest + reply handle) → set.rs add
//!
//! Three resolvers race for each entry:
//!     fast path (cache hit)      ┐
//!     update path (on_update)    ├→ set.rs claim → single winner replies
//!     sweep path (deadline)      ┘
//! ```
//!
//! # Design Decisions
//! - `claim` is the only way out of the set and is linearizable (one lock spans both indices)
//! - Snapshots from `matching` never block writers; each element is claimed before use
//! - The reply handle is taken out exactly once, so a double reply is impossible by construction

pub mod request;
pub mod set;

pub use request::{PendingRequest, ReplyHandle, RequestId};
pub use set::PendingRequestSet;
