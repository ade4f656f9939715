use async_trait::async_trait;
use serde_json::Value;
use ulid::Ulid;

/// External audit-log collaborator. The engine calls `record` once per
/// successful write, with the acting identity, the action name, and a
/// structured detail payload carrying the tracking code once known.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, actor_id: &str, action: &str, entity_id: Ulid, detail: Value);
}

/// Default sink: structured log lines via `tracing`. Deployments wire a real
/// persistence-backed sink in its place.
pub struct LogSink;

#[async_trait]
impl AuditSink for LogSink {
    async fn record(&self, actor_id: &str, action: &str, entity_id: Ulid, detail: Value) {
        tracing::info!(
            target: "audit",
            actor = actor_id,
            action,
            entity = %entity_id,
            detail = %detail,
        );
    }
}
