//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values:
/// `Capacity::Bounded(30)` equals any other `Capacity::Bounded(30)`, while two
/// `Actor`s with equal fields are still only the same actor if their identity
/// keys match.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
