//! Aggregate identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Maximum length of an aggregate identifier, in bytes.
pub const MAX_AGGREGATE_ID_LEN: usize = 128;

/// Opaque identity of an aggregate instance.
///
/// Identifiers are restricted to ASCII alphanumerics, `-` and `_` so they can
/// be used verbatim as broker routing-key tokens and storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregateId(String);

impl AggregateId {
    /// Parses and validates an aggregate identifier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the identifier is empty, longer
    /// than [`MAX_AGGREGATE_ID_LEN`], or contains characters other than ASCII
    /// alphanumerics, `-` and `_`.
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::Validation(
                "aggregate id must not be empty".to_owned(),
            ));
        }
        if value.len() > MAX_AGGREGATE_ID_LEN {
            return Err(DomainError::Validation(format!(
                "aggregate id must be at most {MAX_AGGREGATE_ID_LEN} bytes"
            )));
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(DomainError::Validation(format!(
                "aggregate id contains invalid character {c:?}"
            )));
        }
        Ok(Self(value))
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self::from(Uuid::new_v4())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for AggregateId {
    fn from(id: Uuid) -> Self {
        // Hyphenated UUIDs only contain hex digits and '-'.
        Self(id.hyphenated().to_string())
    }
}

impl TryFrom<String> for AggregateId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AggregateId> for String {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

impl std::str::FromStr for AggregateId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for AggregateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
