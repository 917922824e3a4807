//! Resource capacity.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Maximum number of concurrent active enrollments a resource accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacity {
    Bounded(u32),
    Unbounded,
}

impl Capacity {
    pub fn bounded(limit: u32) -> Self {
        Self::Bounded(limit)
    }

    /// `None` means no upper bound.
    pub fn from_limit(limit: Option<u32>) -> Self {
        limit.map_or(Self::Unbounded, Self::Bounded)
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Capacity::Bounded(n) => Some(*n),
            Capacity::Unbounded => None,
        }
    }

    /// Whether one more enrollment fits given `active` current enrollments.
    pub fn admits(&self, active: usize) -> bool {
        match self {
            Capacity::Bounded(n) => active < *n as usize,
            Capacity::Unbounded => true,
        }
    }

    /// Remaining free slots, `None` when unbounded.
    pub fn remaining(&self, active: usize) -> Option<u32> {
        self.limit()
            .map(|n| n.saturating_sub(u32::try_from(active).unwrap_or(u32::MAX)))
    }
}

impl ValueObject for Capacity {}
