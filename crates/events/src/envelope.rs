use serde::{Deserialize, Serialize};
use uuid::Uuid;

use enrollhub_core::RegistryId;

/// Envelope for an event, carrying stream metadata.
///
/// This is the unit appended to a registry's event stream and fanned out on the bus.
/// `sequence_number` is monotonically increasing per stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    registry_id: RegistryId,
    event_type: String,

    /// Monotonically increasing position in the registry stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        registry_id: RegistryId,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            registry_id,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn registry_id(&self) -> RegistryId {
        self.registry_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
