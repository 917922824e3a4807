//! Event-sourced aggregate contract.

use crate::error::{DomainError, DomainResult};

/// Identity and stream position of an aggregate.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far; equals the last sequence number of its stream.
    fn version(&self) -> u64;
}

/// Stream position a writer expects to append after.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    Any,
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Command/event split of an aggregate.
///
/// `handle` decides and never mutates; `apply` mutates and never fails. A rejected
/// command therefore leaves the aggregate untouched. Neither side performs IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Rebuild state by applying a history in order.
    fn replay<'a>(&mut self, history: impl IntoIterator<Item = &'a Self::Event>)
    where
        Self::Event: 'a,
    {
        for event in history {
            self.apply(event);
        }
    }
}
