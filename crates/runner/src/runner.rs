use std::io::{BufRead, Write};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value as JsonValue;

use enrollhub_events::{EventBus, EventEnvelope};
use enrollhub_infra::{DispatchError, EventStore, RegistryService};

use crate::protocol::{Request, Response};

/// Tally of one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Execute a single request against the service.
pub fn handle<S, B>(service: &RegistryService<S, B>, request: Request) -> Response
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let result = match request {
        Request::AddResource { resource } => {
            let key = resource.key.to_string();
            service
                .add_resource(resource)
                .map(|()| serde_json::json!({ "registered": key }))
        }
        Request::AddActor { actor } => {
            let key = actor.key.to_string();
            service
                .add_actor(actor)
                .map(|()| serde_json::json!({ "registered": key }))
        }
        Request::Enroll { actor, resource } => service.enroll(&actor, &resource).and_then(encode),
        Request::Close { actor, resource } => service.close(&actor, &resource).and_then(encode),
        Request::AddLesson { resource, lesson } => {
            let title = lesson.title.clone();
            service
                .add_lesson(&resource, lesson)
                .map(|()| serde_json::json!({ "resource": resource, "lesson": title }))
        }
        Request::RecordProgress {
            actor,
            resource,
            percent,
        } => service
            .record_progress(&actor, &resource, percent)
            .and_then(encode),
        Request::ListAvailable => service.read(|q| to_json(&q.list_available())).and_then(|inner| inner),
        Request::ListActiveEnrollments => service
            .read(|q| to_json(&q.list_active_enrollments()))
            .and_then(|inner| inner),
        Request::ListResources => service.read(|q| to_json(&q.list_resources())).and_then(|inner| inner),
        Request::ListActors => service.read(|q| to_json(&q.list_actors())).and_then(|inner| inner),
        Request::EnrollmentsForActor { key } => service
            .read(|q| q.enrollments_for_actor(&key).map_err(DispatchError::from).and_then(|v| to_json(&v)))
            .and_then(|inner| inner),
        Request::EnrollmentsForResource { key } => service
            .read(|q| {
                q.enrollments_for_resource(&key)
                    .map_err(DispatchError::from)
                    .and_then(|v| to_json(&v))
            })
            .and_then(|inner| inner),
    };

    match result {
        Ok(data) => Response::Ok { data },
        Err(DispatchError::Domain(err)) => Response::Rejected {
            code: err.code().to_string(),
            message: err.to_string(),
        },
        Err(other) => Response::Failed {
            message: other.to_string(),
        },
    }
}

/// Read JSON-lines requests from `input` and write one response line per request.
///
/// Blank lines and lines starting with `#` are skipped. A malformed line produces a
/// `failed` response and the session continues.
pub fn run<S, B, R, W>(service: &RegistryService<S, B>, input: R, mut output: W) -> anyhow::Result<RunSummary>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: BufRead,
    W: Write,
{
    let mut summary = RunSummary::default();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read input line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => handle(service, request),
            Err(err) => Response::Failed {
                message: format!("line {}: {err}", line_no + 1),
            },
        };

        match &response {
            Response::Ok { .. } => summary.ok += 1,
            Response::Rejected { code, .. } => {
                tracing::debug!(line = line_no + 1, code = %code, "request rejected");
                summary.rejected += 1;
            }
            Response::Failed { message } => {
                tracing::warn!(line = line_no + 1, error = %message, "request failed");
                summary.failed += 1;
            }
        }

        serde_json::to_writer(&mut output, &response).context("failed to encode response")?;
        writeln!(output).context("failed to write response")?;
    }

    output.flush().context("failed to flush output")?;
    Ok(summary)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<JsonValue, DispatchError> {
    serde_json::to_value(value).map_err(|e| DispatchError::Encode(e.to_string()))
}

fn encode<T: Serialize>(value: T) -> Result<JsonValue, DispatchError> {
    to_json(&value)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use enrollhub_events::InMemoryEventBus;
    use enrollhub_infra::{InMemoryEventStore, RegistryConfig};

    use super::*;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn service() -> RegistryService<InMemoryEventStore, Bus> {
        RegistryService::new(
            &RegistryConfig::default(),
            InMemoryEventStore::new(),
            Arc::new(InMemoryEventBus::new()),
        )
        .unwrap()
    }

    fn responses(output: &[u8]) -> Vec<Response> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    const SCRIPT: &str = r#"
# cultural events
{"op":"add_resource","resource":{"key":"Workshop","capacity":{"bounded":1},"kind":{"kind":"workshop","materials":"clay","max_participants":1},"venue":"Hall A","starts_at":null}}
{"op":"add_actor","actor":{"key":"alice@example.com","name":"Alice","email":"alice@example.com"}}
{"op":"add_actor","actor":{"key":"bob@example.com","name":"Bob","email":null}}
{"op":"enroll","actor":"ALICE@example.com","resource":"workshop"}
{"op":"enroll","actor":"bob@example.com","resource":"Workshop"}
{"op":"enroll","actor":"alice@example.com","resource":"Workshop"}
{"op":"list_available"}
{"op":"enrollments_for_actor","key":"carol"}
this is not json
"#;

    #[test]
    fn script_reports_each_outcome() {
        let service = service();
        let mut out = Vec::new();
        let summary = run(&service, SCRIPT.as_bytes(), &mut out).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                ok: 5,
                rejected: 3,
                failed: 1
            }
        );

        let responses = responses(&out);
        assert_eq!(responses.len(), 9);
        assert!(responses[..4].iter().all(Response::is_ok));

        let codes: Vec<&str> = responses
            .iter()
            .filter_map(|r| match r {
                Response::Rejected { code, .. } => Some(code.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec!["capacity_exceeded", "already_enrolled", "not_found"]);

        match &responses[6] {
            Response::Ok { data } => assert_eq!(data, &serde_json::json!([])),
            other => panic!("Expected ok, got {other:?}"),
        }
        assert!(matches!(responses[8], Response::Failed { .. }));
    }

    #[test]
    fn encode_failure_is_reported_as_such() {
        use std::collections::BTreeMap;

        let mut non_string_keys = BTreeMap::new();
        non_string_keys.insert((1u8, 2u8), "pair");

        let err = to_json(&non_string_keys).unwrap_err();
        assert!(matches!(err, DispatchError::Encode(_)));
        assert!(err.to_string().starts_with("failed to serialize"));
    }

    #[test]
    fn enroll_response_carries_the_enrollment() {
        let service = service();
        for req in [
            r#"{"op":"add_resource","resource":{"key":"Dune","capacity":{"bounded":1},"kind":{"kind":"book","author":"Frank Herbert"},"venue":null,"starts_at":null}}"#,
            r#"{"op":"add_actor","actor":{"key":"ana","name":"Ana","email":null}}"#,
        ] {
            assert!(handle(&service, serde_json::from_str(req).unwrap()).is_ok());
        }

        let response = handle(
            &service,
            Request::Enroll {
                actor: "ana".into(),
                resource: "dune".into(),
            },
        );
        match response {
            Response::Ok { data } => {
                assert_eq!(data["actor"], "ana");
                assert_eq!(data["resource"], "Dune");
                assert_eq!(data["status"]["state"], "active");
            }
            other => panic!("Expected ok, got {other:?}"),
        }

        let response = handle(
            &service,
            Request::Close {
                actor: "Ana".into(),
                resource: "Dune".into(),
            },
        );
        match response {
            Response::Ok { data } => assert_eq!(data["status"]["state"], "closed"),
            other => panic!("Expected ok, got {other:?}"),
        }
    }
}
