//! Entity store: owns resources, actors, and enrollments.
//!
//! Resources and actors are kept in insertion order and indexed by their
//! case-insensitive identity key. Enrollments are kept in creation order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use enrollhub_core::{DomainError, DomainResult, EnrollmentId, Entity, EntityKind, IdentityKey};

use crate::model::{Actor, Enrollment, Lesson, NewActor, NewResource, Resource};

/// Whether insertions with an already-used identity key are rejected.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Reject with `DuplicateIdentity`.
    #[default]
    Unique,
    /// Accept; lookups resolve to the first entity inserted under the key, so later
    /// duplicates are listed by queries but can never be enrolled into.
    AllowDuplicates,
}

/// Insertion-ordered table indexed by entity identity.
#[derive(Debug, Clone)]
struct Table<E: Entity> {
    kind: EntityKind,
    rows: Vec<E>,
    index: HashMap<E::Id, usize>,
}

impl<E: Entity> Table<E> {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn ensure_vacant(&self, id: &E::Id, policy: IdentityPolicy) -> DomainResult<()>
    where
        E::Id: core::fmt::Display,
    {
        if policy == IdentityPolicy::Unique && self.index.contains_key(id) {
            return Err(DomainError::duplicate(self.kind, id.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, row: E) -> usize {
        let pos = self.rows.len();
        self.index.entry(row.id().clone()).or_insert(pos);
        self.rows.push(row);
        pos
    }

    fn position(&self, id: &E::Id) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn get(&self, id: &E::Id) -> Option<&E> {
        self.position(id).map(|pos| &self.rows[pos])
    }
}

/// In-memory store of every registry entity.
#[derive(Debug, Clone)]
pub struct EntityStore {
    policy: IdentityPolicy,
    resources: Table<Resource>,
    actors: Table<Actor>,
    enrollments: Table<Enrollment>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_policy(IdentityPolicy::default())
    }

    pub fn with_policy(policy: IdentityPolicy) -> Self {
        Self {
            policy,
            resources: Table::new(EntityKind::Resource),
            actors: Table::new(EntityKind::Actor),
            enrollments: Table::new(EntityKind::Enrollment),
        }
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    /// Insert a resource. Fails with `DuplicateIdentity` under `IdentityPolicy::Unique`.
    pub fn add_resource(&mut self, resource: NewResource) -> DomainResult<&Resource> {
        self.ensure_resource_vacant(&resource.key)?;
        let pos = self.resources.insert(Resource::from_new(resource));
        Ok(&self.resources.rows[pos])
    }

    /// Insert an actor. Fails with `DuplicateIdentity` under `IdentityPolicy::Unique`.
    pub fn add_actor(&mut self, actor: NewActor) -> DomainResult<&Actor> {
        self.ensure_actor_vacant(&actor.key)?;
        let pos = self.actors.insert(Actor::from_new(actor));
        Ok(&self.actors.rows[pos])
    }

    pub fn ensure_resource_vacant(&self, key: &IdentityKey) -> DomainResult<()> {
        self.resources.ensure_vacant(key, self.policy)
    }

    pub fn ensure_actor_vacant(&self, key: &IdentityKey) -> DomainResult<()> {
        self.actors.ensure_vacant(key, self.policy)
    }

    /// Case-insensitive lookup by title/name.
    pub fn find_resource(&self, key: &str) -> DomainResult<&Resource> {
        lookup_key(key)
            .and_then(|k| self.resources.get(&k))
            .ok_or_else(|| DomainError::not_found(EntityKind::Resource, key.trim()))
    }

    /// Case-insensitive lookup by name/email.
    pub fn find_actor(&self, key: &str) -> DomainResult<&Actor> {
        lookup_key(key)
            .and_then(|k| self.actors.get(&k))
            .ok_or_else(|| DomainError::not_found(EntityKind::Actor, key.trim()))
    }

    pub fn find_enrollment(&self, id: EnrollmentId) -> DomainResult<&Enrollment> {
        self.enrollments
            .get(&id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Enrollment, id.to_string()))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.rows.iter()
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.rows.iter()
    }

    pub fn enrollments(&self) -> impl Iterator<Item = &Enrollment> {
        self.enrollments.rows.iter()
    }

    /// Resolve a list of enrollment ids (as held by an actor or resource).
    pub fn resolve<'a>(&'a self, ids: &'a [EnrollmentId]) -> impl Iterator<Item = &'a Enrollment> {
        ids.iter().filter_map(|id| self.enrollments.get(id))
    }

    /// Number of active enrollments currently held against the resource.
    pub fn active_count(&self, resource: &Resource) -> usize {
        self.resolve(resource.enrollment_ids())
            .filter(|e| e.is_active())
            .count()
    }

    /// The actor's active enrollment in `resource`, searched in the actor's history.
    pub fn active_enrollment<'a>(
        &'a self,
        actor: &'a Actor,
        resource: &IdentityKey,
    ) -> Option<&'a Enrollment> {
        self.resolve(actor.enrollment_ids())
            .find(|e| e.is_active() && e.resource() == resource)
    }

    /// Register the link on the enrollment table and both endpoints.
    ///
    /// Course enrollments start at 0% progress. Both endpoints are resolved before anything is written, so either all three
    /// collections change or none does.
    pub(crate) fn link(&mut self, enrollment: Enrollment) -> bool {
        let (Some(actor_pos), Some(resource_pos)) = (
            self.actors.position(enrollment.actor()),
            self.resources.position(enrollment.resource()),
        ) else {
            return false;
        };
        if self.enrollments.position(&enrollment.id_typed()).is_some() {
            return false;
        }

        let mut enrollment = enrollment;
        if self.resources.rows[resource_pos].kind().is_course() {
            enrollment.set_progress(0);
        }

        let id = enrollment.id_typed();
        self.actors.rows[actor_pos].attach(id);
        self.resources.rows[resource_pos].attach(id);
        self.enrollments.insert(enrollment);
        true
    }

    pub(crate) fn close(&mut self, id: EnrollmentId, at: DateTime<Utc>) {
        if let Some(pos) = self.enrollments.position(&id) {
            self.enrollments.rows[pos].close(at);
        }
    }

    pub(crate) fn set_progress(&mut self, id: EnrollmentId, percent: u8) {
        if let Some(pos) = self.enrollments.position(&id) {
            self.enrollments.rows[pos].set_progress(percent);
        }
    }

    pub(crate) fn push_lesson(&mut self, resource: &IdentityKey, lesson: Lesson) {
        if let Some(pos) = self.resources.position(resource) {
            self.resources.rows[pos].push_lesson(lesson);
        }
    }

    /// Insert without the vacancy check; used when replaying accepted events.
    pub(crate) fn insert_resource(&mut self, resource: NewResource) {
        self.resources.insert(Resource::from_new(resource));
    }

    pub(crate) fn insert_actor(&mut self, actor: NewActor) {
        self.actors.insert(Actor::from_new(actor));
    }
}

fn lookup_key(raw: &str) -> Option<IdentityKey> {
    IdentityKey::parse(raw).ok()
}
