//! Configuration data model.
//!
//! # Data Flow
//! ```text
//! client request (namespace, name, def checksum)
//!     → identity.rs (validated ConfigIdentity, cache + registry key)
//!     → value.rs (ConfigValue as delivered by upstream, cached, replied)
//! ```
//!
//! # Design Decisions
//! - Identities are validated once at admission; everything downstream trusts them
//! - Values are immutable and shared as `Arc<ConfigValue>`; a newer value replaces, never mutates
//! - Generation 0 is the reset sentinel and is matched specially on delivery

pub mod identity;
pub mod value;

pub use identity::{ConfigIdentity, IdentityError};
pub use value::{ConfigValue, KnownConfig, RESET_GENERATION};
