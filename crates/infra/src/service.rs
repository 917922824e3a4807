//! Command execution for a live registry.
//!
//! `RegistryService` holds the current `Registry` behind a mutex and runs every
//! command through one pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Lock the registry (one writer at a time)
//!   ↓
//! 2. Handle command (pure decision logic, produces events)
//!   ↓
//! 3. Append events to the store (optimistic version check)
//!   ↓
//! 4. Apply events to the in-memory registry
//!   ↓
//! 5. Publish events to the bus
//! ```
//!
//! Steps 2–4 run under the same lock, so a capacity check and the enrollment it
//! admits are one critical section: two callers can never both see the last free
//! slot. Reads take the same lock and see a consistent snapshot.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use enrollhub_core::{Aggregate, AggregateRoot, DomainError, EnrollmentId, ExpectedVersion, RegistryId};
use enrollhub_events::{EventBus, EventEnvelope};
use enrollhub_registry::{
    AddLesson, CloseEnrollment, Enroll, Enrollment, Lesson, NewActor, NewResource, Queries,
    RecordProgress, RegisterActor, RegisterResource, Registry, RegistryCommand, RegistryEvent,
};

use crate::config::RegistryConfig;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command was rejected by a domain rule (not found, full, duplicate, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Persisting to or loading from the event store failed.
    #[error(transparent)]
    Store(#[from] EventStoreError),
    /// A historical payload could not be decoded into a registry event.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    /// A result could not be encoded for the caller; the command itself succeeded.
    #[error("failed to serialize result: {0}")]
    Encode(String),
    /// Publication failed after a successful append; the events are committed.
    #[error("event publication failed: {0}")]
    Publish(String),
    /// A previous writer panicked while holding the registry lock.
    #[error("registry lock poisoned")]
    Poisoned,
}

impl DispatchError {
    /// The domain rejection, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Live registry plus the store and bus its events flow to.
#[derive(Debug)]
pub struct RegistryService<S, B> {
    registry: Mutex<Registry>,
    store: S,
    bus: B,
}

impl<S, B> RegistryService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Start a service for the configured registry, replaying its stream if one exists.
    pub fn new(config: &RegistryConfig, store: S, bus: B) -> Result<Self, DispatchError> {
        let registry_id = config.registry_id.unwrap_or_default();
        let mut registry = Registry::with_policy(registry_id, config.identity_policy);

        let history = store.load_stream(registry_id)?;
        validate_loaded_stream(registry_id, &history)?;
        apply_history(&mut registry, &history)?;

        tracing::info!(
            registry_id = %registry_id,
            replayed = history.len(),
            policy = ?config.identity_policy,
            "registry service started"
        );

        Ok(Self {
            registry: Mutex::new(registry),
            store,
            bus,
        })
    }

    pub fn registry_id(&self) -> Result<RegistryId, DispatchError> {
        Ok(self.lock()?.id_typed())
    }

    /// Dispatch a command through the full pipeline and return the committed events.
    pub fn dispatch(&self, command: RegistryCommand) -> Result<Vec<StoredEvent>, DispatchError> {
        let mut registry = self.lock()?;
        let registry_id = registry.id_typed();

        let decided = match registry.handle(&command) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(registry_id = %registry_id, command = command_name(&command), error = %err, "command rejected");
                return Err(err.into());
            }
        };
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(registry_id, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let expected = ExpectedVersion::Exact(registry.version());
        let committed = self.store.append(uncommitted, expected).inspect_err(|err| {
            tracing::error!(registry_id = %registry_id, error = %err, "event append failed");
        })?;

        for event in &decided {
            registry.apply(event);
            log_applied(event);
        }
        drop(registry);

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    pub fn add_resource(&self, resource: NewResource) -> Result<(), DispatchError> {
        self.dispatch(RegistryCommand::RegisterResource(RegisterResource {
            resource,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    pub fn add_actor(&self, actor: NewActor) -> Result<(), DispatchError> {
        self.dispatch(RegistryCommand::RegisterActor(RegisterActor {
            actor,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    pub fn enroll(&self, actor: &str, resource: &str) -> Result<Enrollment, DispatchError> {
        let id = EnrollmentId::new();
        self.dispatch(RegistryCommand::Enroll(Enroll {
            enrollment_id: id,
            actor: actor.to_string(),
            resource: resource.to_string(),
            occurred_at: Utc::now(),
        }))?;
        self.enrollment(id)
    }

    pub fn close(&self, actor: &str, resource: &str) -> Result<Enrollment, DispatchError> {
        let committed = self.dispatch(RegistryCommand::CloseEnrollment(CloseEnrollment {
            actor: actor.to_string(),
            resource: resource.to_string(),
            occurred_at: Utc::now(),
        }))?;
        self.enrollment_from(&committed)
    }

    pub fn add_lesson(&self, resource: &str, lesson: Lesson) -> Result<(), DispatchError> {
        self.dispatch(RegistryCommand::AddLesson(AddLesson {
            resource: resource.to_string(),
            lesson,
            occurred_at: Utc::now(),
        }))
        .map(drop)
    }

    pub fn record_progress(
        &self,
        actor: &str,
        resource: &str,
        percent: u8,
    ) -> Result<Enrollment, DispatchError> {
        let committed = self.dispatch(RegistryCommand::RecordProgress(RecordProgress {
            actor: actor.to_string(),
            resource: resource.to_string(),
            percent,
            occurred_at: Utc::now(),
        }))?;
        self.enrollment_from(&committed)
    }

    /// Run a read-only query against a consistent snapshot.
    pub fn read<R>(&self, query: impl FnOnce(Queries<'_>) -> R) -> Result<R, DispatchError> {
        let registry = self.lock()?;
        Ok(query(registry.queries()))
    }

    /// Clone of the current registry state.
    pub fn snapshot(&self) -> Result<Registry, DispatchError> {
        Ok(self.lock()?.clone())
    }

    fn enrollment(&self, id: EnrollmentId) -> Result<Enrollment, DispatchError> {
        self.read(|q| q.find_enrollment(id).cloned())?
            .map_err(DispatchError::from)
    }

    fn enrollment_from(&self, committed: &[StoredEvent]) -> Result<Enrollment, DispatchError> {
        let id = committed
            .iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .find_map(RegistryEvent::enrollment_id)
            .ok_or_else(|| DomainError::invariant("command produced no enrollment event"))?;
        self.enrollment(id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>, DispatchError> {
        self.registry.lock().map_err(|_| DispatchError::Poisoned)
    }
}

fn command_name(command: &RegistryCommand) -> &'static str {
    match command {
        RegistryCommand::RegisterResource(_) => "register_resource",
        RegistryCommand::RegisterActor(_) => "register_actor",
        RegistryCommand::Enroll(_) => "enroll",
        RegistryCommand::CloseEnrollment(_) => "close_enrollment",
        RegistryCommand::AddLesson(_) => "add_lesson",
        RegistryCommand::RecordProgress(_) => "record_progress",
    }
}

fn log_applied(event: &RegistryEvent) {
    match event {
        RegistryEvent::ResourceRegistered(e) => {
            tracing::info!(resource = %e.resource.key, kind = e.resource.kind.label(), "resource registered");
        }
        RegistryEvent::ActorRegistered(e) => {
            tracing::info!(actor = %e.actor.key, "actor registered");
        }
        RegistryEvent::ActorEnrolled(e) => {
            tracing::info!(
                actor = %e.actor,
                resource = %e.resource,
                enrollment_id = %e.enrollment_id,
                "actor enrolled"
            );
        }
        RegistryEvent::EnrollmentClosed(e) => {
            tracing::info!(enrollment_id = %e.enrollment_id, "enrollment closed");
        }
        RegistryEvent::LessonAdded(e) => {
            tracing::info!(resource = %e.resource, lesson = %e.lesson.title, "lesson added");
        }
        RegistryEvent::ProgressRecorded(e) => {
            tracing::debug!(enrollment_id = %e.enrollment_id, percent = e.percent, "progress recorded");
        }
    }
}

fn decode(stored: &StoredEvent) -> Result<RegistryEvent, DispatchError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| DispatchError::Deserialize(e.to_string()))
}

fn validate_loaded_stream(registry_id: RegistryId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    // Streams must be contiguous from 1 so the registry version matches the stream version.
    for (idx, e) in stream.iter().enumerate() {
        if e.registry_id != registry_id {
            return Err(DispatchError::Store(EventStoreError::StreamMismatch(format!(
                "loaded stream contains wrong registry_id at index {idx}"
            ))));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (expected={expected}, found={})",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

/// Decode the whole history before touching the registry.
fn apply_history(registry: &mut Registry, history: &[StoredEvent]) -> Result<(), DispatchError> {
    let events = history.iter().map(decode).collect::<Result<Vec<_>, _>>()?;
    registry.replay(&events);
    Ok(())
}
