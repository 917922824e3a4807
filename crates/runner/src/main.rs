use std::io;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use enrollhub_events::{EventEnvelope, InMemoryEventBus};
use enrollhub_infra::{InMemoryEventStore, RegistryConfig, RegistryService};

fn main() -> anyhow::Result<()> {
    enrollhub_observability::init();

    let config = RegistryConfig::from_env()?;
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    let service = RegistryService::new(&config, InMemoryEventStore::new(), bus)?;

    tracing::info!(registry_id = %service.registry_id()?, "registry ready");

    let summary = enrollhub_runner::run(&service, io::stdin().lock(), io::stdout().lock())?;

    tracing::info!(
        ok = summary.ok,
        rejected = summary.rejected,
        failed = summary.failed,
        "session finished"
    );
    Ok(())
}
