//! Errors surfaced to the local transport at admission time.

use thiserror::Error;

use crate::model::IdentityError;

/// Why a request was refused before entering the pending set.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed namespace, name or definition checksum.
    #[error("invalid config identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// Requested timeout outside the accepted range.
    #[error("invalid timeout {requested_ms} ms (must be between 1 and {max_ms} ms)")]
    InvalidTimeout { requested_ms: u64, max_ms: u64 },

    /// The proxy no longer admits requests.
    #[error("config proxy is shutting down")]
    ShuttingDown,
}

impl ProxyError {
    /// Whether the client sent something it can fix.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ProxyError::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProxyError::InvalidTimeout { requested_ms: 0, max_ms: 300_000 };
        assert_eq!(err.to_string(), "invalid timeout 0 ms (must be between 1 and 300000 ms)");
        assert!(err.is_client_error());

        let err = ProxyError::from(IdentityError::Empty { field: "name" });
        assert_eq!(err.to_string(), "invalid config identity: name must not be empty");

        assert!(!ProxyError::ShuttingDown.is_client_error());
    }
}
