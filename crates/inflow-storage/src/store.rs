// Storage seam between the API and the concrete engines

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreateEvent, EventRow, PendingPage, PendingQuery, Transition};

/// Capability interface for event persistence.
///
/// Every operation is scoped by tenant and independently atomic; there are
/// no cross-call transactions. Engines must make the idempotency-key
/// uniqueness check effective under concurrent creates (a storage-level
/// constraint, not a read-then-write check).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Prepare the engine (create tables/indexes where applicable).
    async fn initialize(&self) -> Result<()>;

    /// Insert a new pending event.
    ///
    /// Fails with [`StoreError::IdempotencyConflict`] when a non-deleted
    /// event already holds the same `(tenant_id, idempotency_key)` pair,
    /// carrying the surviving event's id.
    ///
    /// [`StoreError::IdempotencyConflict`]: crate::error::StoreError::IdempotencyConflict
    async fn create_event(&self, input: CreateEvent) -> Result<EventRow>;

    /// Fetch one event by id, excluding soft-deleted rows.
    async fn get_event_by_id(&self, event_id: Uuid, tenant_id: &str) -> Result<Option<EventRow>>;

    /// Fetch the non-deleted event holding an idempotency key, if any.
    async fn get_by_idempotency(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<EventRow>>;

    /// Keyset-paginated scan over a tenant's pending events, ascending by
    /// `(created_at, id)`. The limit is clamped to `[1, 500]`.
    async fn pending_events(&self, query: PendingQuery) -> Result<PendingPage>;

    /// Conditional `pending -> acknowledged` transition; also marks the
    /// event delivered and refreshes `updated_at`.
    async fn acknowledge_event(&self, event_id: Uuid, tenant_id: &str) -> Result<Transition>;

    /// Conditional `pending|acknowledged -> deleted` transition (soft
    /// delete); refreshes `updated_at`.
    async fn delete_event(&self, event_id: Uuid, tenant_id: &str) -> Result<Transition>;

    /// Physically purge settled events (`acknowledged` or `deleted`) whose
    /// last transition happened more than `ttl_minutes` before `now`.
    /// Returns the number of rows removed. `now` is explicit so the sweep
    /// is testable without touching the wall clock.
    async fn cleanup_old_events(&self, ttl_minutes: i64, now: DateTime<Utc>) -> Result<u64>;

    /// Cheap connectivity probe. Never errors.
    async fn health_check(&self) -> bool;

    /// Release the engine's resources.
    async fn close(&self);
}
