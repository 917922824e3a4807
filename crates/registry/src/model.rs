//! Registry entities: resources, actors, and the enrollments linking them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use enrollhub_core::{Capacity, EnrollmentId, Entity, IdentityKey};

/// A single lesson inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    pub duration_minutes: u32,
    pub instructor: String,
}

/// Variant-specific payload of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Hands-on event; `max_participants` is informational, `Capacity` is what gets enforced.
    Workshop {
        materials: String,
        max_participants: u32,
    },
    Lecture {
        speaker: String,
        topic: String,
        expected_duration_minutes: u32,
    },
    Show {
        artist: String,
        genre: String,
        age_rating: u8,
    },
    Book {
        author: String,
    },
    Course {
        description: String,
        lessons: Vec<Lesson>,
    },
    Generic,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Workshop { .. } => "workshop",
            ResourceKind::Lecture { .. } => "lecture",
            ResourceKind::Show { .. } => "show",
            ResourceKind::Book { .. } => "book",
            ResourceKind::Course { .. } => "course",
            ResourceKind::Generic => "generic",
        }
    }

    pub fn is_course(&self) -> bool {
        matches!(self, ResourceKind::Course { .. })
    }
}

/// Input for registering a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    pub key: IdentityKey,
    pub capacity: Capacity,
    pub kind: ResourceKind,
    pub venue: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
}

impl NewResource {
    pub fn new(key: IdentityKey, capacity: Capacity, kind: ResourceKind) -> Self {
        Self {
            key,
            capacity,
            kind,
            venue: None,
            starts_at: None,
        }
    }

    /// A lendable book: one copy, so capacity 1.
    pub fn book(key: IdentityKey, author: impl Into<String>) -> Self {
        Self::new(
            key,
            Capacity::bounded(1),
            ResourceKind::Book {
                author: author.into(),
            },
        )
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn starting_at(mut self, at: DateTime<Utc>) -> Self {
        self.starts_at = Some(at);
        self
    }
}

/// Something actors enroll into (event, book, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    key: IdentityKey,
    capacity: Capacity,
    kind: ResourceKind,
    venue: Option<String>,
    starts_at: Option<DateTime<Utc>>,
    enrollments: Vec<EnrollmentId>,
}

impl Resource {
    pub(crate) fn from_new(new: NewResource) -> Self {
        Self {
            key: new.key,
            capacity: new.capacity,
            kind: new.kind,
            venue: new.venue,
            starts_at: new.starts_at,
            enrollments: Vec::new(),
        }
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn venue(&self) -> Option<&str> {
        self.venue.as_deref()
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.starts_at
    }

    /// Every enrollment ever made against this resource, oldest first.
    pub fn enrollment_ids(&self) -> &[EnrollmentId] {
        &self.enrollments
    }

    pub(crate) fn attach(&mut self, id: EnrollmentId) {
        self.enrollments.push(id);
    }

    pub(crate) fn push_lesson(&mut self, lesson: Lesson) -> bool {
        match &mut self.kind {
            ResourceKind::Course { lessons, .. } => {
                lessons.push(lesson);
                true
            }
            _ => false,
        }
    }
}

impl Entity for Resource {
    type Id = IdentityKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

/// Input for registering an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActor {
    pub key: IdentityKey,
    pub name: String,
    pub email: Option<String>,
}

impl NewActor {
    /// Actor looked up by its own name.
    pub fn named(key: IdentityKey) -> Self {
        Self {
            name: key.as_str().to_string(),
            key,
            email: None,
        }
    }

    /// Actor looked up by email, displayed by name.
    pub fn with_email(name: impl Into<String>, email: IdentityKey) -> Self {
        Self {
            name: name.into(),
            email: Some(email.as_str().to_string()),
            key: email,
        }
    }
}

/// Someone who enrolls (participant, reader, student).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    key: IdentityKey,
    name: String,
    email: Option<String>,
    enrollments: Vec<EnrollmentId>,
}

impl Actor {
    pub(crate) fn from_new(new: NewActor) -> Self {
        Self {
            key: new.key,
            name: new.name,
            email: new.email,
            enrollments: Vec::new(),
        }
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// The actor's enrollment history, oldest first.
    pub fn enrollment_ids(&self) -> &[EnrollmentId] {
        &self.enrollments
    }

    /// Size of the history, active and closed alike.
    pub fn enrollment_count(&self) -> usize {
        self.enrollments.len()
    }

    pub(crate) fn attach(&mut self, id: EnrollmentId) {
        self.enrollments.push(id);
    }
}

impl Entity for Actor {
    type Id = IdentityKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

/// Enrollment lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Closed { closed_at: DateTime<Utc> },
}

/// Link between one actor and one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    id: EnrollmentId,
    actor: IdentityKey,
    resource: IdentityKey,
    enrolled_at: DateTime<Utc>,
    status: EnrollmentStatus,
    progress: Option<u8>,
}

impl Enrollment {
    pub(crate) fn new(
        id: EnrollmentId,
        actor: IdentityKey,
        resource: IdentityKey,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            actor,
            resource,
            enrolled_at,
            status: EnrollmentStatus::Active,
            progress: None,
        }
    }

    pub fn id_typed(&self) -> EnrollmentId {
        self.id
    }

    pub fn actor(&self) -> &IdentityKey {
        &self.actor
    }

    pub fn resource(&self) -> &IdentityKey {
        &self.resource
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, EnrollmentStatus::Active)
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            EnrollmentStatus::Active => None,
            EnrollmentStatus::Closed { closed_at } => Some(closed_at),
        }
    }

    /// Course progress in percent; starts at `Some(0)` for courses, `None` otherwise.
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub(crate) fn close(&mut self, at: DateTime<Utc>) {
        if self.is_active() {
            self.status = EnrollmentStatus::Closed { closed_at: at };
        }
    }

    pub(crate) fn set_progress(&mut self, percent: u8) {
        self.progress = Some(percent);
    }
}

impl Entity for Enrollment {
    type Id = EnrollmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
