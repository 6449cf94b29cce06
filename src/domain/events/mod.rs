//! Domain events
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "domain", content = "event")]
pub enum DomainEvent {
    Import(ImportEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    Uploaded { run_id: Uuid, file_name: String },
    Started { run_id: Uuid },
    Completed { run_id: Uuid, created: usize, replaced: usize, skipped: usize, errors: usize },
    Failed { run_id: Uuid, reason: String },
}

impl DomainEvent {
    pub fn subject(&self) -> String {
        match self {
            Self::Import(e) => format!("catalog.import.{}", e.kind()),
        }
    }
}

impl ImportEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uploaded { .. } => "uploaded",
            Self::Started { .. } => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Publishes events to NATS. Delivery failures are logged and dropped.
pub async fn publish(client: &async_nats::Client, events: Vec<DomainEvent>) {
    for event in events {
        let subject = event.subject();
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { warn!(%subject, error = %e, "failed to encode event"); continue; }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(%subject, error = %e, "failed to publish event");
        }
    }
}
