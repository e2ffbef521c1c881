// Storage models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use inflow_core::Cursor;
use sqlx::FromRow;
use uuid::Uuid;

/// Default page size for the pending scan.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Hard ceiling on the pending-scan page size.
pub const MAX_PAGE_LIMIT: i64 = 500;

// ============================================
// Event models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub source: Option<String>,
    #[sqlx(rename = "type")]
    pub event_type: Option<String>,
    pub topic: Option<String>,
    pub payload: sqlx::types::JsonValue,
    pub delivered: bool,
    pub status: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    /// The row's position in its tenant's `(created_at, id)` order.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub tenant_id: String,
    pub source: Option<String>,
    pub event_type: Option<String>,
    pub topic: Option<String>,
    /// Stored as an empty object when absent.
    pub payload: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
}

/// Filters for the pending-inbox scan. All filters compose conjunctively
/// on top of the base predicate (tenant match, pending, undelivered).
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub tenant_id: String,
    pub limit: i64,
    pub since: Option<DateTime<Utc>>,
    pub topic: Option<String>,
    pub event_type: Option<String>,
    pub cursor: Option<Cursor>,
}

impl PendingQuery {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            limit: DEFAULT_PAGE_LIMIT,
            since: None,
            topic: None,
            event_type: None,
            cursor: None,
        }
    }
}

/// One page of pending events plus the position to resume from, if any.
#[derive(Debug, Clone)]
pub struct PendingPage {
    pub events: Vec<EventRow>,
    pub next: Option<Cursor>,
}

/// Outcome of a conditional status transition.
///
/// A single storage round trip distinguishes all four cases, so callers can
/// map idempotent repeats, terminal rows, and missing rows without a second
/// read racing the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The row matched and the transition was applied.
    Applied,
    /// The row already carries the requested status.
    AlreadyInState,
    /// The row is soft-deleted; nothing leaves `deleted`.
    Terminal,
    /// No row for this `(event_id, tenant_id)`.
    NotFound,
}
