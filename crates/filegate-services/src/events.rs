//! Lifecycle event delivery seam
//!
//! Transitions return their events; services deliver them through this
//! trait only after the record update has been durably persisted. The
//! external transport (webhooks, queues) lives behind implementations of
//! `EventPublisher`; delivery is at-most-once and failures are observed,
//! not propagated into the business operation.

use async_trait::async_trait;
use filegate_core::models::FileEvent;

/// Destination for lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &FileEvent) -> anyhow::Result<()>;
}

/// Publisher that emits events as structured log lines.
///
/// Useful as a default wiring and in deployments where an external
/// consumer tails the logs.
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &FileEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            event_type = %event.event_type,
            file_id = %event.file_id,
            storage_key = %event.storage_key,
            payload,
            "Lifecycle event"
        );
        Ok(())
    }
}
