//! JSON-lines front end for a registry service.
//!
//! Each input line is one [`Request`]; each produces exactly one [`Response`] line.

pub mod protocol;
pub mod runner;

pub use protocol::{Request, Response};
pub use runner::{RunSummary, handle, run};
