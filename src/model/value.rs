//! Configuration values as cached and delivered to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::identity::ConfigIdentity;

/// Reserved generation meaning "empty/reset"; satisfies every pending request.
pub const RESET_GENERATION: i64 = 0;

/// One immutable version of a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub identity: ConfigIdentity,
    /// Checksum of the payload content.
    #[serde(default)]
    pub content_checksum: String,
    /// Non-decreasing version counter per identity.
    pub generation: i64,
    #[serde(default)]
    pub payload: Value,
    /// Set when upstream could not produce this config.
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConfigValue {
    pub fn new(
        identity: ConfigIdentity,
        content_checksum: impl Into<String>,
        generation: i64,
        payload: Value,
    ) -> Self {
        Self {
            identity,
            content_checksum: content_checksum.into(),
            generation,
            payload,
            error: false,
            error_message: None,
        }
    }

    /// Error-flagged value returned when nothing better is known for `identity`.
    ///
    /// Carries the generation the client already holds so it does not look
    /// like a new config.
    pub fn error_sentinel(
        identity: ConfigIdentity,
        generation: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            content_checksum: String::new(),
            generation,
            payload: Value::Null,
            error: true,
            error_message: Some(message.into()),
        }
    }

    /// Whether this value can be served without asking upstream again.
    pub fn is_usable(&self) -> bool {
        !self.error && self.generation > RESET_GENERATION
    }

    /// Whether this value differs from what the client reports holding.
    pub fn differs_from(&self, known: &KnownConfig) -> bool {
        self.generation != known.generation || self.content_checksum != known.content_checksum
    }

    /// Whether delivering this value answers a request that holds `requested_generation`.
    pub fn satisfies(&self, requested_generation: i64) -> bool {
        self.generation >= requested_generation || self.generation == RESET_GENERATION
    }
}

/// What a client reports it already holds for an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownConfig {
    #[serde(default)]
    pub generation: i64,
    #[serde(default)]
    pub content_checksum: String,
}

impl KnownConfig {
    pub fn new(generation: i64, content_checksum: impl Into<String>) -> Self {
        Self { generation, content_checksum: content_checksum.into() }
    }
}
