// DynamoDB event store (skeleton for the managed deployment path)
//
// The table design is settled (partition key tenant_id, sort key id, a GSI
// on (tenant_id, idempotency_key) for the conflict check, a GSI on
// (tenant_id, status, created_at, id) for the pending scan, and conditional
// writes covering the status transitions) but the implementation is not
// wired up yet. Every operation reports itself unsupported so a
// misconfigured deployment fails loudly instead of losing events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{CreateEvent, EventRow, PendingPage, PendingQuery, Transition};
use crate::store::EventStore;

/// Placeholder DynamoDB engine behind the same [`EventStore`] seam as the
/// SQLite engine.
#[derive(Debug, Default)]
pub struct DynamoStore;

impl DynamoStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventStore for DynamoStore {
    async fn initialize(&self) -> Result<()> {
        // Table creation is owned by infrastructure; nothing to prepare here.
        Ok(())
    }

    async fn create_event(&self, _input: CreateEvent) -> Result<EventRow> {
        Err(StoreError::Unsupported("create_event"))
    }

    async fn get_event_by_id(
        &self,
        _event_id: Uuid,
        _tenant_id: &str,
    ) -> Result<Option<EventRow>> {
        Err(StoreError::Unsupported("get_event_by_id"))
    }

    async fn get_by_idempotency(
        &self,
        _tenant_id: &str,
        _idempotency_key: &str,
    ) -> Result<Option<EventRow>> {
        Err(StoreError::Unsupported("get_by_idempotency"))
    }

    async fn pending_events(&self, _query: PendingQuery) -> Result<PendingPage> {
        Err(StoreError::Unsupported("pending_events"))
    }

    async fn acknowledge_event(&self, _event_id: Uuid, _tenant_id: &str) -> Result<Transition> {
        Err(StoreError::Unsupported("acknowledge_event"))
    }

    async fn delete_event(&self, _event_id: Uuid, _tenant_id: &str) -> Result<Transition> {
        Err(StoreError::Unsupported("delete_event"))
    }

    async fn cleanup_old_events(&self, _ttl_minutes: i64, _now: DateTime<Utc>) -> Result<u64> {
        Err(StoreError::Unsupported("cleanup_old_events"))
    }

    async fn health_check(&self) -> bool {
        false
    }

    async fn close(&self) {}
}
