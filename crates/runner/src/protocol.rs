//! JSON-lines request/response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use enrollhub_registry::{Lesson, NewActor, NewResource};

/// One line of input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    AddResource { resource: NewResource },
    AddActor { actor: NewActor },
    Enroll { actor: String, resource: String },
    Close { actor: String, resource: String },
    AddLesson { resource: String, lesson: Lesson },
    RecordProgress { actor: String, resource: String, percent: u8 },
    ListAvailable,
    ListActiveEnrollments,
    ListResources,
    ListActors,
    EnrollmentsForActor { key: String },
    EnrollmentsForResource { key: String },
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { data: JsonValue },
    /// A domain rule said no; `code` is stable, `message` is for humans.
    Rejected { code: String, message: String },
    /// Malformed input or an infrastructure failure.
    Failed { message: String },
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}
