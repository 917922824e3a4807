//! Things with identity: two rows are the same entity when their ids match.

pub trait Entity {
    /// Key the entity is stored and looked up by.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
