//! Identity keys: the human-facing names entities are looked up by.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Case-insensitive identity key (title, name, or email).
///
/// Equality and hashing use the case-folded form, so `"Workshop"` and `"WORKSHOP"`
/// address the same entity. The original spelling is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityKey {
    display: String,
    folded: String,
}

impl IdentityKey {
    /// Build a key from raw input. Surrounding whitespace is ignored; an empty key is rejected.
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("identity key cannot be empty"));
        }
        Ok(Self {
            display: trimmed.to_string(),
            folded: fold(trimmed),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Case-folded form used for comparisons and indexing.
    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// Compare against a raw lookup string without allocating a key.
    pub fn matches(&self, raw: &str) -> bool {
        self.folded == fold(raw.trim())
    }
}

fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for IdentityKey {}

impl core::hash::Hash for IdentityKey {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl core::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for IdentityKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for IdentityKey {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IdentityKey> for String {
    fn from(value: IdentityKey) -> Self {
        value.display
    }
}

impl ValueObject for IdentityKey {}
