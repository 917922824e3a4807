//! Domain error model.

use thiserror::Error;

use crate::id::EnrollmentId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Which identity space a lookup or insertion targeted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Actor,
    Resource,
    Enrollment,
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            EntityKind::Actor => "actor",
            EntityKind::Resource => "resource",
            EntityKind::Enrollment => "enrollment",
        };
        f.write_str(s)
    }
}

/// Domain-level error.
///
/// Every variant is a recoverable, reported condition. Callers decide whether to
/// re-prompt, retry, or abort the current operation; nothing here is fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty identity, progress out of range).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A lookup by identity key missed.
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    /// An entity with the same identity key already exists.
    #[error("{kind} already exists: {key}")]
    DuplicateIdentity { kind: EntityKind, key: String },

    /// The actor already holds an active enrollment for the resource. `existing` is
    /// the untouched link.
    #[error("{actor} is already enrolled in {resource}")]
    AlreadyEnrolled {
        actor: String,
        resource: String,
        existing: EnrollmentId,
    },

    /// The resource has no free capacity left.
    #[error("{resource} is full (capacity {capacity})")]
    CapacityExceeded { resource: String, capacity: u32 },

    /// No active enrollment exists for the (actor, resource) pair.
    #[error("{actor} has no active enrollment in {resource}")]
    NotEnrolled { actor: String, resource: String },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn duplicate(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::DuplicateIdentity {
            kind,
            key: key.into(),
        }
    }

    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound { .. } => "not_found",
            Self::DuplicateIdentity { .. } => "duplicate_identity",
            Self::AlreadyEnrolled { .. } => "already_enrolled",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotEnrolled { .. } => "not_enrolled",
            Self::Conflict(_) => "conflict",
        }
    }

    /// True for lookup misses, regardless of which identity space missed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
