use std::collections::HashMap;
use std::sync::RwLock;

use enrollhub_core::{ExpectedVersion, RegistryId};

use super::store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Event store backed by a map of vectors. Data lives as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<RegistryId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registries with at least one committed event.
    pub fn stream_count(&self) -> Result<usize, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams.values().filter(|s| !s.is_empty()).count())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(registry_id) = events.first().map(|e| e.registry_id) else {
            return Ok(Vec::new());
        };
        if let Some(idx) = events.iter().position(|e| e.registry_id != registry_id) {
            return Err(EventStoreError::StreamMismatch(format!(
                "batch mixes registries (first foreign event at index {idx})"
            )));
        }

        let mut streams = self.streams.write().map_err(|_| EventStoreError::Poisoned)?;
        let stream = streams.entry(registry_id).or_default();
        let current = stream.last().map_or(0, |e| e.sequence_number);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "registry {registry_id}: expected {expected_version:?}, stream is at {current}"
            )));
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(event, seq)| event.commit(seq))
            .collect();
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, registry_id: RegistryId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams.get(&registry_id).cloned().unwrap_or_default())
    }
}
