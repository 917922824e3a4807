//! Append-only storage for registry event streams.

pub mod in_memory;
pub mod store;

pub use in_memory::InMemoryEventStore;
pub use store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
