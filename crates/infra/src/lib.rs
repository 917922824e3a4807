//! Infrastructure layer: event storage, command execution, configuration.

pub mod config;
pub mod event_store;
pub mod service;

pub use config::RegistryConfig;
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use service::{DispatchError, RegistryService};
