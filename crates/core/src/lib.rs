//! `enrollhub-core`: domain building blocks shared by every crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod capacity;
pub mod entity;
pub mod error;
pub mod id;
pub mod identity;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use capacity::Capacity;
pub use entity::Entity;
pub use error::{DomainError, DomainResult, EntityKind};
pub use id::{EnrollmentId, RegistryId};
pub use identity::IdentityKey;
pub use value_object::ValueObject;
