use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use enrollhub_core::{ExpectedVersion, RegistryId};
use enrollhub_events::{Event, EventEnvelope};

/// A registry event serialized for storage but not yet placed in its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub registry_id: RegistryId,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Serialize a typed event, keeping the metadata replay needs.
    pub fn from_typed<E>(registry_id: RegistryId, event_id: Uuid, event: &E) -> Result<Self, EventStoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            registry_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    /// Place the event at `sequence_number` in its stream.
    pub fn commit(self, sequence_number: u64) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            registry_id: self.registry_id,
            sequence_number,
            event_type: self.event_type,
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            payload: self.payload,
        }
    }
}

/// A committed event. Sequence numbers start at 1 and have no gaps within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub registry_id: RegistryId,
    pub sequence_number: u64,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl StoredEvent {
    /// Envelope handed to the event bus.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.registry_id,
            self.event_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Storage-level failures, as opposed to domain rejections.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event store lock poisoned")]
    Poisoned,
}

/// Append-only event log with one stream per registry.
///
/// `append` checks `expected_version` against the stream's last sequence number and
/// either commits the whole batch or nothing. `load_stream` of an unknown registry
/// is an empty vector.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(&self, registry_id: RegistryId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Last committed sequence number, 0 for an empty stream.
    fn stream_version(&self, registry_id: RegistryId) -> Result<u64, EventStoreError> {
        Ok(self
            .load_stream(registry_id)?
            .last()
            .map_or(0, |e| e.sequence_number))
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, registry_id: RegistryId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(registry_id)
    }

    fn stream_version(&self, registry_id: RegistryId) -> Result<u64, EventStoreError> {
        (**self).stream_version(registry_id)
    }
}
