use chrono::{DateTime, Utc};

/// A fact recorded in a registry stream.
///
/// Implementors are plain data: once emitted, an event is never edited, only
/// followed by later events.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name stored alongside the payload (e.g. `registry.enrollment.created`).
    fn event_type(&self) -> &'static str;

    /// Payload schema revision for `event_type`.
    fn version(&self) -> u32;

    /// Business time at which the fact happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}
