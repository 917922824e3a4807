//! Read-only projections over the entity store.

use enrollhub_core::{DomainResult, EnrollmentId};

use crate::model::{Actor, Enrollment, Resource};
use crate::store::EntityStore;

/// Availability snapshot of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability<'a> {
    pub resource: &'a Resource,
    pub active: usize,
    /// `None` when the resource is unbounded.
    pub remaining: Option<u32>,
}

/// Query facade. Borrowing the store keeps every query side-effect free.
#[derive(Debug, Clone, Copy)]
pub struct Queries<'a> {
    store: &'a EntityStore,
}

impl<'a> Queries<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// Resources that can take at least one more enrollment, in insertion order.
    ///
    /// Under `IdentityPolicy::AllowDuplicates` a later resource sharing a key may be
    /// listed here while `enroll` by that key still resolves to the first one.
    pub fn list_available(&self) -> Vec<&'a Resource> {
        self.store
            .resources()
            .filter(|r| r.capacity().admits(self.store.active_count(r)))
            .collect()
    }

    /// Every active enrollment, in creation order.
    pub fn list_active_enrollments(&self) -> Vec<&'a Enrollment> {
        self.store.enrollments().filter(|e| e.is_active()).collect()
    }

    /// The actor's full history. Unknown actor is `NotFound`; no history is an empty list.
    pub fn enrollments_for_actor(&self, key: &str) -> DomainResult<Vec<&'a Enrollment>> {
        let actor = self.store.find_actor(key)?;
        Ok(self.store.resolve(actor.enrollment_ids()).collect())
    }

    /// Every enrollment made against the resource, active and closed.
    pub fn enrollments_for_resource(&self, key: &str) -> DomainResult<Vec<&'a Enrollment>> {
        let resource = self.store.find_resource(key)?;
        Ok(self.store.resolve(resource.enrollment_ids()).collect())
    }

    pub fn list_resources(&self) -> Vec<&'a Resource> {
        self.store.resources().collect()
    }

    pub fn list_actors(&self) -> Vec<&'a Actor> {
        self.store.actors().collect()
    }

    pub fn find_enrollment(&self, id: EnrollmentId) -> DomainResult<&'a Enrollment> {
        self.store.find_enrollment(id)
    }

    pub fn availability(&self, key: &str) -> DomainResult<Availability<'a>> {
        let resource = self.store.find_resource(key)?;
        let active = self.store.active_count(resource);
        Ok(Availability {
            resource,
            active,
            remaining: resource.capacity().remaining(active),
        })
    }
}
