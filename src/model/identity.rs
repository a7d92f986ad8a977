//! Configuration identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons an identity is refused at admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} '{value}' contains invalid characters")]
    InvalidCharacters { field: &'static str, value: String },

    #[error("definition checksum '{0}' is not lowercase hex")]
    InvalidChecksum(String),
}

/// The (namespace, name, definition checksum) triple naming one config stream.
///
/// Used as the key of the request cache, the pending index and the
/// subscription registry. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IdentityParts")]
pub struct ConfigIdentity {
    namespace: String,
    name: String,
    def_checksum: String,
}

impl ConfigIdentity {
    /// Build a validated identity.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        def_checksum: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let namespace = namespace.into();
        let name = name.into();
        let def_checksum = def_checksum.into();

        validate_symbol("namespace", &namespace)?;
        validate_symbol("name", &name)?;
        if name.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return Err(IdentityError::InvalidCharacters { field: "name", value: name });
        }
        if !def_checksum
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(IdentityError::InvalidChecksum(def_checksum));
        }

        Ok(Self { namespace, name, def_checksum })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn def_checksum(&self) -> &str {
        &self.def_checksum
    }
}

/// Unvalidated wire form; deserialization goes through [`ConfigIdentity::new`].
#[derive(Deserialize)]
struct IdentityParts {
    namespace: String,
    name: String,
    #[serde(default)]
    def_checksum: String,
}

impl TryFrom<IdentityParts> for ConfigIdentity {
    type Error = IdentityError;

    fn try_from(parts: IdentityParts) -> Result<Self, Self::Error> {
        Self::new(parts.namespace, parts.name, parts.def_checksum)
    }
}

fn validate_symbol(field: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Empty { field });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(IdentityError::InvalidCharacters { field, value: value.to_string() });
    }
    Ok(())
}

impl fmt::Display for ConfigIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)?;
        if !self.def_checksum.is_empty() {
            write!(f, ",{}", self.def_checksum)?;
        }
        Ok(())
    }
}
