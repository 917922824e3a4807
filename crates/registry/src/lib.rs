//! Enrollment registry domain module (event-sourced).
//!
//! Resources (events, books, courses) and actors (participants, readers, students)
//! live in an [`EntityStore`]; the [`Registry`] aggregate is its only writer and
//! enforces capacity and duplicate-enrollment rules; [`Queries`] reads it.
//!
//! Everything here is deterministic domain logic: no IO, no logging, no storage.

pub mod model;
pub mod query;
pub mod registry;
pub mod store;

pub use model::{
    Actor, Enrollment, EnrollmentStatus, Lesson, NewActor, NewResource, Resource, ResourceKind,
};
pub use query::{Availability, Queries};
pub use registry::{
    ActorEnrolled, ActorRegistered, AddLesson, CloseEnrollment, Enroll, EnrollmentClosed,
    LessonAdded, ProgressRecorded, RecordProgress, RegisterActor, RegisterResource, Registry,
    RegistryCommand, RegistryEvent, ResourceRegistered,
};
pub use store::{EntityStore, IdentityPolicy};
