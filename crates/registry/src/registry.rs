use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use enrollhub_core::{
    Aggregate, AggregateRoot, DomainError, EnrollmentId, IdentityKey, RegistryId,
};
use enrollhub_events::Event;

use crate::model::{Actor, Enrollment, Lesson, NewActor, NewResource, Resource};
use crate::query::Queries;
use crate::store::{EntityStore, IdentityPolicy};

/// Aggregate root: Registry.
///
/// Owns the entity store and is the only writer to it. Every mutation goes through
/// `handle` (validation, no side effects) followed by `apply` (infallible state change),
/// so a rejected command leaves the store exactly as it was.
#[derive(Debug, Clone)]
pub struct Registry {
    id: RegistryId,
    store: EntityStore,
    version: u64,
}

impl Registry {
    /// Create an empty registry instance (also used for rehydration).
    pub fn empty(id: RegistryId) -> Self {
        Self::with_policy(id, IdentityPolicy::default())
    }

    pub fn with_policy(id: RegistryId, policy: IdentityPolicy) -> Self {
        Self {
            id,
            store: EntityStore::with_policy(policy),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> RegistryId {
        self.id
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn queries(&self) -> Queries<'_> {
        Queries::new(&self.store)
    }

    /// Handle a command and apply the resulting events.
    pub fn execute(&mut self, command: &RegistryCommand) -> Result<Vec<RegistryEvent>, DomainError> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    pub fn add_resource(&mut self, resource: NewResource) -> Result<&Resource, DomainError> {
        self.execute(&RegistryCommand::RegisterResource(RegisterResource {
            resource,
            occurred_at: Utc::now(),
        }))?;
        self.store
            .resources()
            .last()
            .ok_or_else(|| DomainError::invariant("registered resource missing from store"))
    }

    pub fn add_actor(&mut self, actor: NewActor) -> Result<&Actor, DomainError> {
        self.execute(&RegistryCommand::RegisterActor(RegisterActor {
            actor,
            occurred_at: Utc::now(),
        }))?;
        self.store
            .actors()
            .last()
            .ok_or_else(|| DomainError::invariant("registered actor missing from store"))
    }

    /// Enroll `actor` into `resource` now.
    pub fn enroll(&mut self, actor: &str, resource: &str) -> Result<Enrollment, DomainError> {
        self.enroll_at(actor, resource, Utc::now())
    }

    pub fn enroll_at(
        &mut self,
        actor: &str,
        resource: &str,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, DomainError> {
        let id = EnrollmentId::new();
        self.execute(&RegistryCommand::Enroll(Enroll {
            enrollment_id: id,
            actor: actor.to_string(),
            resource: resource.to_string(),
            occurred_at: at,
        }))?;
        self.store.find_enrollment(id).cloned()
    }

    /// Close the active enrollment for the pair (return a book, withdraw from an event).
    pub fn close(&mut self, actor: &str, resource: &str) -> Result<Enrollment, DomainError> {
        self.close_at(actor, resource, Utc::now())
    }

    pub fn close_at(
        &mut self,
        actor: &str,
        resource: &str,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, DomainError> {
        let events = self.execute(&RegistryCommand::CloseEnrollment(CloseEnrollment {
            actor: actor.to_string(),
            resource: resource.to_string(),
            occurred_at: at,
        }))?;
        self.enrollment_from(&events)
    }

    pub fn add_lesson(&mut self, resource: &str, lesson: Lesson) -> Result<&Resource, DomainError> {
        self.execute(&RegistryCommand::AddLesson(AddLesson {
            resource: resource.to_string(),
            lesson,
            occurred_at: Utc::now(),
        }))?;
        self.store.find_resource(resource)
    }

    pub fn record_progress(
        &mut self,
        actor: &str,
        resource: &str,
        percent: u8,
    ) -> Result<Enrollment, DomainError> {
        let events = self.execute(&RegistryCommand::RecordProgress(RecordProgress {
            actor: actor.to_string(),
            resource: resource.to_string(),
            percent,
            occurred_at: Utc::now(),
        }))?;
        self.enrollment_from(&events)
    }

    fn enrollment_from(&self, events: &[RegistryEvent]) -> Result<Enrollment, DomainError> {
        let id = events
            .iter()
            .find_map(RegistryEvent::enrollment_id)
            .ok_or_else(|| DomainError::invariant("command produced no enrollment event"))?;
        self.store.find_enrollment(id).cloned()
    }
}

impl AggregateRoot for Registry {
    type Id = RegistryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterResource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResource {
    pub resource: NewResource,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterActor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterActor {
    pub actor: NewActor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Enroll. Keys are raw lookup strings, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enroll {
    pub enrollment_id: EnrollmentId,
    pub actor: String,
    pub resource: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseEnrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEnrollment {
    pub actor: String,
    pub resource: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLesson {
    pub resource: String,
    pub lesson: Lesson,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordProgress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProgress {
    pub actor: String,
    pub resource: String,
    pub percent: u8,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryCommand {
    RegisterResource(RegisterResource),
    RegisterActor(RegisterActor),
    Enroll(Enroll),
    CloseEnrollment(CloseEnrollment),
    AddLesson(AddLesson),
    RecordProgress(RecordProgress),
}

/// Event: ResourceRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRegistered {
    pub resource: NewResource,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ActorRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRegistered {
    pub actor: NewActor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ActorEnrolled. Keys are the canonical keys of the resolved entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorEnrolled {
    pub enrollment_id: EnrollmentId,
    pub actor: IdentityKey,
    pub resource: IdentityKey,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EnrollmentClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentClosed {
    pub enrollment_id: EnrollmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LessonAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonAdded {
    pub resource: IdentityKey,
    pub lesson: Lesson,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProgressRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecorded {
    pub enrollment_id: EnrollmentId,
    pub percent: u8,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    ResourceRegistered(ResourceRegistered),
    ActorRegistered(ActorRegistered),
    ActorEnrolled(ActorEnrolled),
    EnrollmentClosed(EnrollmentClosed),
    LessonAdded(LessonAdded),
    ProgressRecorded(ProgressRecorded),
}

impl RegistryEvent {
    /// The enrollment this event touched, if any.
    pub fn enrollment_id(&self) -> Option<EnrollmentId> {
        match self {
            RegistryEvent::ActorEnrolled(e) => Some(e.enrollment_id),
            RegistryEvent::EnrollmentClosed(e) => Some(e.enrollment_id),
            RegistryEvent::ProgressRecorded(e) => Some(e.enrollment_id),
            _ => None,
        }
    }
}

impl Event for RegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::ResourceRegistered(_) => "registry.resource.registered",
            RegistryEvent::ActorRegistered(_) => "registry.actor.registered",
            RegistryEvent::ActorEnrolled(_) => "registry.enrollment.created",
            RegistryEvent::EnrollmentClosed(_) => "registry.enrollment.closed",
            RegistryEvent::LessonAdded(_) => "registry.course.lesson_added",
            RegistryEvent::ProgressRecorded(_) => "registry.enrollment.progress_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RegistryEvent::ResourceRegistered(e) => e.occurred_at,
            RegistryEvent::ActorRegistered(e) => e.occurred_at,
            RegistryEvent::ActorEnrolled(e) => e.occurred_at,
            RegistryEvent::EnrollmentClosed(e) => e.occurred_at,
            RegistryEvent::LessonAdded(e) => e.occurred_at,
            RegistryEvent::ProgressRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Registry {
    type Command = RegistryCommand;
    type Event = RegistryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RegistryEvent::ResourceRegistered(e) => {
                self.store.insert_resource(e.resource.clone());
            }
            RegistryEvent::ActorRegistered(e) => {
                self.store.insert_actor(e.actor.clone());
            }
            RegistryEvent::ActorEnrolled(e) => {
                self.store.link(Enrollment::new(
                    e.enrollment_id,
                    e.actor.clone(),
                    e.resource.clone(),
                    e.occurred_at,
                ));
            }
            RegistryEvent::EnrollmentClosed(e) => {
                self.store.close(e.enrollment_id, e.occurred_at);
            }
            RegistryEvent::LessonAdded(e) => {
                self.store.push_lesson(&e.resource, e.lesson.clone());
            }
            RegistryEvent::ProgressRecorded(e) => {
                self.store.set_progress(e.enrollment_id, e.percent);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RegistryCommand::RegisterResource(cmd) => self.handle_register_resource(cmd),
            RegistryCommand::RegisterActor(cmd) => self.handle_register_actor(cmd),
            RegistryCommand::Enroll(cmd) => self.handle_enroll(cmd),
            RegistryCommand::CloseEnrollment(cmd) => self.handle_close(cmd),
            RegistryCommand::AddLesson(cmd) => self.handle_add_lesson(cmd),
            RegistryCommand::RecordProgress(cmd) => self.handle_record_progress(cmd),
        }
    }
}

impl Registry {
    fn handle_register_resource(
        &self,
        cmd: &RegisterResource,
    ) -> Result<Vec<RegistryEvent>, DomainError> {
        self.store.ensure_resource_vacant(&cmd.resource.key)?;

        Ok(vec![RegistryEvent::ResourceRegistered(ResourceRegistered {
            resource: cmd.resource.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_actor(
        &self,
        cmd: &RegisterActor,
    ) -> Result<Vec<RegistryEvent>, DomainError> {
        self.store.ensure_actor_vacant(&cmd.actor.key)?;
        if cmd.actor.name.trim().is_empty() {
            return Err(DomainError::validation("actor name cannot be empty"));
        }

        Ok(vec![RegistryEvent::ActorRegistered(ActorRegistered {
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_enroll(&self, cmd: &Enroll) -> Result<Vec<RegistryEvent>, DomainError> {
        let actor = self.store.find_actor(&cmd.actor)?;
        let resource = self.store.find_resource(&cmd.resource)?;

        if let Some(existing) = self.store.active_enrollment(actor, resource.key()) {
            return Err(DomainError::AlreadyEnrolled {
                actor: actor.key().to_string(),
                resource: resource.key().to_string(),
                existing: existing.id_typed(),
            });
        }

        let active = self.store.active_count(resource);
        if !resource.capacity().admits(active) {
            return Err(DomainError::CapacityExceeded {
                resource: resource.key().to_string(),
                capacity: resource.capacity().limit().unwrap_or(u32::MAX),
            });
        }

        if self.store.find_enrollment(cmd.enrollment_id).is_ok() {
            return Err(DomainError::conflict("enrollment id already in use"));
        }

        Ok(vec![RegistryEvent::ActorEnrolled(ActorEnrolled {
            enrollment_id: cmd.enrollment_id,
            actor: actor.key().clone(),
            resource: resource.key().clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseEnrollment) -> Result<Vec<RegistryEvent>, DomainError> {
        let existing = self.active_link(&cmd.actor, &cmd.resource)?;

        Ok(vec![RegistryEvent::EnrollmentClosed(EnrollmentClosed {
            enrollment_id: existing.id_typed(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_lesson(&self, cmd: &AddLesson) -> Result<Vec<RegistryEvent>, DomainError> {
        let resource = self.store.find_resource(&cmd.resource)?;

        if !resource.kind().is_course() {
            return Err(DomainError::validation(format!(
                "lessons can only be added to courses, {} is a {}",
                resource.key(),
                resource.kind().label()
            )));
        }
        if cmd.lesson.title.trim().is_empty() {
            return Err(DomainError::validation("lesson title cannot be empty"));
        }
        if cmd.lesson.duration_minutes == 0 {
            return Err(DomainError::validation("lesson duration must be positive"));
        }

        Ok(vec![RegistryEvent::LessonAdded(LessonAdded {
            resource: resource.key().clone(),
            lesson: cmd.lesson.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_progress(
        &self,
        cmd: &RecordProgress,
    ) -> Result<Vec<RegistryEvent>, DomainError> {
        if cmd.percent > 100 {
            return Err(DomainError::validation("progress must be between 0 and 100"));
        }
        let existing = self.active_link(&cmd.actor, &cmd.resource)?;

        Ok(vec![RegistryEvent::ProgressRecorded(ProgressRecorded {
            enrollment_id: existing.id_typed(),
            percent: cmd.percent,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn active_link(&self, actor: &str, resource: &str) -> Result<&Enrollment, DomainError> {
        let actor = self.store.find_actor(actor)?;
        let resource = self.store.find_resource(resource)?;

        self.store
            .active_enrollment(actor, resource.key())
            .ok_or_else(|| DomainError::NotEnrolled {
                actor: actor.key().to_string(),
                resource: resource.key().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrollhub_core::{Capacity, EntityKind};

    use crate::model::{EnrollmentStatus, ResourceKind};

    fn key(s: &str) -> IdentityKey {
        IdentityKey::parse(s).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn workshop(title: &str, capacity: u32) -> NewResource {
        NewResource::new(
            key(title),
            Capacity::bounded(capacity),
            ResourceKind::Workshop {
                materials: "laptop".into(),
                max_participants: capacity,
            },
        )
        .with_venue("Room 1")
    }

    fn registry_with(resources: Vec<NewResource>, actors: &[&str]) -> Registry {
        let mut registry = Registry::empty(RegistryId::new());
        for r in resources {
            registry.add_resource(r).unwrap();
        }
        for a in actors {
            registry.add_actor(NewActor::named(key(a))).unwrap();
        }
        registry
    }

    fn snapshot(registry: &Registry, actor: &str, resource: &str) -> (Vec<Enrollment>, Vec<Enrollment>) {
        let q = registry.queries();
        (
            q.enrollments_for_actor(actor).unwrap().into_iter().cloned().collect(),
            q.enrollments_for_resource(resource).unwrap().into_iter().cloned().collect(),
        )
    }

    #[test]
    fn register_resource_emits_resource_registered_event() {
        let registry = Registry::empty(RegistryId::new());
        let cmd = RegisterResource {
            resource: workshop("Workshop", 1),
            occurred_at: test_time(),
        };

        let events = registry
            .handle(&RegistryCommand::RegisterResource(cmd.clone()))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            RegistryEvent::ResourceRegistered(e) => {
                assert_eq!(e.resource, cmd.resource);
                assert_eq!(events[0].event_type(), "registry.resource.registered");
            }
            _ => panic!("Expected ResourceRegistered event"),
        }
    }

    #[test]
    fn workshop_with_capacity_one_rejects_second_actor() {
        let mut registry = registry_with(vec![workshop("Workshop", 1)], &["alice", "bob"]);

        let enrollment = registry.enroll("alice", "Workshop").unwrap();
        assert!(enrollment.is_active());
        assert_eq!(enrollment.actor().as_str(), "alice");

        let err = registry.enroll("bob", "Workshop").unwrap_err();
        assert_eq!(
            err,
            DomainError::CapacityExceeded {
                resource: "Workshop".into(),
                capacity: 1
            }
        );

        let available = registry.queries().list_available();
        assert!(available.iter().all(|r| r.key().as_str() != "Workshop"));
    }

    #[test]
    fn second_enroll_of_same_pair_is_already_enrolled() {
        let mut registry = registry_with(vec![workshop("Workshop", 5)], &["alice"]);

        let first = registry.enroll("alice", "Workshop").unwrap();
        let count_before = registry.store().enrollments().count();

        let err = registry.enroll("ALICE", "workshop").unwrap_err();
        match err {
            DomainError::AlreadyEnrolled { existing, .. } => assert_eq!(existing, first.id_typed()),
            other => panic!("Expected AlreadyEnrolled, got {other:?}"),
        }

        assert_eq!(registry.store().enrollments().count(), count_before);
        assert_eq!(
            registry.queries().enrollments_for_actor("alice").unwrap().len(),
            1
        );
        assert_eq!(registry.queries().find_enrollment(first.id_typed()).unwrap(), &first);
    }

    #[test]
    fn unknown_endpoints_are_not_found() {
        let mut registry = registry_with(vec![workshop("Workshop", 5)], &["alice"]);

        let err = registry.enroll("zoe", "Workshop").unwrap_err();
        assert_eq!(err, DomainError::not_found(EntityKind::Actor, "zoe"));

        let err = registry.enroll("alice", "Concert").unwrap_err();
        assert_eq!(err, DomainError::not_found(EntityKind::Resource, "Concert"));
    }

    #[test]
    fn failed_enroll_leaves_both_sides_unchanged() {
        let mut registry = registry_with(vec![workshop("Workshop", 1)], &["alice", "bob"]);
        registry.enroll("alice", "Workshop").unwrap();

        let before_bob = snapshot(&registry, "bob", "Workshop");
        let version = registry.version();
        registry.enroll("bob", "Workshop").unwrap_err();
        assert_eq!(snapshot(&registry, "bob", "Workshop"), before_bob);

        let before_alice = snapshot(&registry, "alice", "Workshop");
        registry.enroll("alice", "Workshop").unwrap_err();
        assert_eq!(snapshot(&registry, "alice", "Workshop"), before_alice);

        assert_eq!(registry.version(), version);
    }

    #[test]
    fn enrollment_appears_on_both_endpoints() {
        let mut registry = registry_with(vec![workshop("Workshop", 3)], &["alice"]);
        let enrollment = registry.enroll("alice", "Workshop").unwrap();

        let (by_actor, by_resource) = snapshot(&registry, "alice", "Workshop");
        assert_eq!(by_actor, vec![enrollment.clone()]);
        assert_eq!(by_resource, vec![enrollment]);
    }

    #[test]
    fn zero_capacity_resource_never_accepts() {
        let mut registry = registry_with(vec![workshop("Closed Door", 0)], &["alice"]);
        let err = registry.enroll("alice", "Closed Door").unwrap_err();
        assert!(matches!(err, DomainError::CapacityExceeded { capacity: 0, .. }));
        assert!(registry.queries().list_available().is_empty());
    }

    #[test]
    fn unbounded_resource_accepts_everyone() {
        let open = NewResource::new(key("Open Day"), Capacity::Unbounded, ResourceKind::Generic);
        let names: Vec<String> = (0..50).map(|i| format!("visitor-{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut registry = registry_with(vec![open], &refs);

        for name in &refs {
            registry.enroll(name, "open day").unwrap();
        }
        assert_eq!(registry.queries().list_active_enrollments().len(), 50);
        assert_eq!(registry.queries().list_available().len(), 1);
    }

    #[test]
    fn returning_a_book_frees_it_for_another_reader() {
        let book = NewResource::book(key("Dom Casmurro"), "Machado de Assis");
        let mut registry = registry_with(vec![book], &["Ana", "Bruno"]);

        registry.enroll("ana", "dom casmurro").unwrap();
        assert!(matches!(
            registry.enroll("bruno", "Dom Casmurro").unwrap_err(),
            DomainError::CapacityExceeded { .. }
        ));

        let returned = registry.close("Ana", "Dom Casmurro").unwrap();
        assert!(matches!(returned.status(), EnrollmentStatus::Closed { .. }));
        assert!(returned.closed_at().is_some());

        let loan = registry.enroll("Bruno", "Dom Casmurro").unwrap();
        assert!(loan.is_active());

        let active = registry.queries().list_active_enrollments();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].actor().as_str(), "Bruno");

        // Ana's history keeps the closed loan.
        let ana = registry.store().find_actor("ana").unwrap();
        assert_eq!(ana.enrollment_count(), 1);
    }

    #[test]
    fn closed_enrollment_is_terminal() {
        let book = NewResource::book(key("Dune"), "Frank Herbert");
        let mut registry = registry_with(vec![book], &["ana"]);
        registry.enroll("ana", "Dune").unwrap();
        registry.close("ana", "Dune").unwrap();

        let err = registry.close("ana", "Dune").unwrap_err();
        assert!(matches!(err, DomainError::NotEnrolled { .. }));
    }

    #[test]
    fn reader_can_borrow_same_book_again_after_return() {
        let book = NewResource::book(key("Dune"), "Frank Herbert");
        let mut registry = registry_with(vec![book], &["ana"]);
        let first = registry.enroll("ana", "Dune").unwrap();
        registry.close("ana", "Dune").unwrap();
        let second = registry.enroll("ana", "Dune").unwrap();

        assert_ne!(first.id_typed(), second.id_typed());
        assert_eq!(registry.queries().enrollments_for_actor("ana").unwrap().len(), 2);
    }

    #[test]
    fn lessons_only_go_to_courses() {
        let course = NewResource::new(
            key("Rust 101"),
            Capacity::bounded(30),
            ResourceKind::Course {
                description: "ownership and borrowing".into(),
                lessons: Vec::new(),
            },
        );
        let mut registry = registry_with(vec![course, workshop("Workshop", 1)], &[]);

        let lesson = Lesson {
            title: "Borrowing".into(),
            duration_minutes: 45,
            instructor: "Ferris".into(),
        };
        let resource = registry.add_lesson("rust 101", lesson.clone()).unwrap();
        match resource.kind() {
            ResourceKind::Course { lessons, .. } => assert_eq!(lessons, &vec![lesson.clone()]),
            other => panic!("Expected course, got {other:?}"),
        }

        let err = registry.add_lesson("Workshop", lesson).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("workshop")));
    }

    #[test]
    fn progress_is_bounded_and_needs_an_active_enrollment() {
        let course = NewResource::new(
            key("Rust 101"),
            Capacity::bounded(30),
            ResourceKind::Course {
                description: String::new(),
                lessons: Vec::new(),
            },
        );
        let mut registry = registry_with(vec![course], &["alice", "bob"]);
        let enrollment = registry.enroll("alice", "Rust 101").unwrap();
        assert_eq!(enrollment.progress(), Some(0));

        let updated = registry.record_progress("alice", "Rust 101", 40).unwrap();
        assert_eq!(updated.progress(), Some(40));
        assert_eq!(updated.id_typed(), enrollment.id_typed());

        assert!(matches!(
            registry.record_progress("alice", "Rust 101", 101).unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            registry.record_progress("bob", "Rust 101", 10).unwrap_err(),
            DomainError::NotEnrolled { .. }
        ));
    }

    #[test]
    fn non_course_enrollments_carry_no_progress() {
        let starts = "2026-03-14T19:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let lecture = NewResource::new(
            key("Ownership Talk"),
            Capacity::bounded(100),
            ResourceKind::Lecture {
                speaker: "Ferris".into(),
                topic: "borrowing".into(),
                expected_duration_minutes: 50,
            },
        )
        .with_venue("Auditorium")
        .starting_at(starts);
        let mut registry = registry_with(vec![lecture], &["alice"]);

        let resource = registry.store().find_resource("ownership talk").unwrap();
        assert_eq!(resource.starts_at(), Some(starts));
        assert_eq!(resource.venue(), Some("Auditorium"));

        let enrollment = registry.enroll("alice", "Ownership Talk").unwrap();
        assert_eq!(enrollment.progress(), None);
    }

    #[test]
    fn availability_tracks_active_and_remaining_places() {
        let open = NewResource::new(key("Open Day"), Capacity::Unbounded, ResourceKind::Generic);
        let mut registry = registry_with(vec![workshop("Workshop", 2), open], &["alice"]);

        let before = registry.queries().availability("workshop").unwrap();
        assert_eq!((before.active, before.remaining), (0, Some(2)));
        assert_eq!(before.resource.key().as_str(), "Workshop");

        registry.enroll("alice", "Workshop").unwrap();
        let during = registry.queries().availability("Workshop").unwrap();
        assert_eq!((during.active, during.remaining), (1, Some(1)));

        registry.close("alice", "Workshop").unwrap();
        let after = registry.queries().availability("Workshop").unwrap();
        assert_eq!((after.active, after.remaining), (0, Some(2)));

        registry.enroll("alice", "Open Day").unwrap();
        let unbounded = registry.queries().availability("open day").unwrap();
        assert_eq!((unbounded.active, unbounded.remaining), (1, None));

        assert!(registry.queries().availability("Nowhere").unwrap_err().is_not_found());
    }

    #[test]
    fn later_duplicate_resource_is_listed_but_lookups_hit_the_first() {
        let mut registry = Registry::with_policy(RegistryId::new(), IdentityPolicy::AllowDuplicates);
        registry.add_resource(workshop("W", 1)).unwrap();
        registry.add_resource(workshop("w", 5)).unwrap();
        for a in ["a", "b"] {
            registry.add_actor(NewActor::named(key(a))).unwrap();
        }
        registry.enroll("a", "W").unwrap();

        let available: Vec<_> = registry
            .queries()
            .list_available()
            .into_iter()
            .map(|r| r.capacity())
            .collect();
        assert_eq!(available, vec![Capacity::bounded(5)]);

        assert!(matches!(
            registry.enroll("b", "w").unwrap_err(),
            DomainError::CapacityExceeded { capacity: 1, .. }
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = registry_with(vec![workshop("Workshop", 1)], &["alice"]);
        assert!(matches!(
            registry.add_resource(workshop("WORKSHOP", 9)).unwrap_err(),
            DomainError::DuplicateIdentity { kind: EntityKind::Resource, .. }
        ));
        assert!(matches!(
            registry.add_actor(NewActor::named(key("Alice"))).unwrap_err(),
            DomainError::DuplicateIdentity { kind: EntityKind::Actor, .. }
        ));
    }

    #[test]
    fn version_increments_on_apply() {
        let mut registry = Registry::empty(RegistryId::new());
        assert_eq!(registry.version(), 0);

        registry.add_resource(workshop("Workshop", 2)).unwrap();
        assert_eq!(registry.version(), 1);

        registry.add_actor(NewActor::named(key("alice"))).unwrap();
        registry.enroll("alice", "Workshop").unwrap();
        assert_eq!(registry.version(), 3);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let registry = registry_with(vec![workshop("Workshop", 1)], &["alice"]);
        let before_version = registry.version();

        let cmd = RegistryCommand::Enroll(Enroll {
            enrollment_id: EnrollmentId::new(),
            actor: "alice".into(),
            resource: "Workshop".into(),
            occurred_at: test_time(),
        });
        let events1 = registry.handle(&cmd).unwrap();
        let events2 = registry.handle(&cmd).unwrap();

        assert_eq!(events1, events2);
        assert_eq!(registry.version(), before_version);
        assert_eq!(registry.store().enrollments().count(), 0);
    }

    #[test]
    fn apply_is_deterministic() {
        let registry_id = RegistryId::new();
        let enrollment_id = EnrollmentId::new();
        let at = test_time();
        let events = vec![
            RegistryEvent::ResourceRegistered(ResourceRegistered {
                resource: workshop("Workshop", 1),
                occurred_at: at,
            }),
            RegistryEvent::ActorRegistered(ActorRegistered {
                actor: NewActor::with_email("Alice", key("alice@example.com")),
                occurred_at: at,
            }),
            RegistryEvent::ActorEnrolled(ActorEnrolled {
                enrollment_id,
                actor: key("alice@example.com"),
                resource: key("Workshop"),
                occurred_at: at,
            }),
        ];

        let mut r1 = Registry::empty(registry_id);
        let mut r2 = Registry::empty(registry_id);
        r1.replay(&events);
        for e in &events {
            r2.apply(e);
        }

        assert_eq!(r1.version(), r2.version());
        assert_eq!(
            r1.queries().list_active_enrollments(),
            r2.queries().list_active_enrollments()
        );
        let alice = r1.store().find_actor("ALICE@example.com").unwrap();
        assert_eq!(alice.name(), "Alice");
        assert_eq!(alice.email(), Some("alice@example.com"));
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = RegistryEvent::ActorEnrolled(ActorEnrolled {
            enrollment_id: EnrollmentId::new(),
            actor: key("alice"),
            resource: key("Workshop"),
            occurred_at: test_time(),
        });
        let json = serde_json::to_value(&event).unwrap();
        let back: RegistryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of enroll/close calls pushes a resource past its capacity.
            #[test]
            fn active_enrollments_never_exceed_capacity(
                capacity in 0u32..5,
                ops in prop::collection::vec((0usize..8, any::<bool>()), 1..60)
            ) {
                let names: Vec<String> = (0..8).map(|i| format!("actor-{i}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let mut registry = registry_with(vec![workshop("Workshop", capacity)], &refs);

                for (who, close) in ops {
                    let before = registry.queries().list_active_enrollments().len();
                    let result = if close {
                        registry.close(&names[who], "Workshop")
                    } else {
                        registry.enroll(&names[who], "Workshop")
                    };
                    let after = registry.queries().list_active_enrollments().len();

                    if result.is_err() {
                        prop_assert_eq!(before, after);
                    }
                    prop_assert!(after <= capacity as usize);
                }
            }

            /// Property: re-enrolling an active pair never changes the enrollment count.
            #[test]
            fn duplicate_enroll_is_rejected_without_side_effects(repeats in 1usize..10) {
                let mut registry = registry_with(vec![workshop("Workshop", 10)], &["alice"]);
                registry.enroll("alice", "Workshop").unwrap();

                for _ in 0..repeats {
                    let is_duplicate = matches!(
                        registry.enroll("alice", "Workshop"),
                        Err(DomainError::AlreadyEnrolled { .. })
                    );
                    prop_assert!(is_duplicate);
                }
                prop_assert_eq!(registry.store().enrollments().count(), 1);
            }
        }
    }
}
