// Retrieval flow: filters, cursor chaining, status transitions, stream polls

use std::sync::Arc;

use chrono::{DateTime, Utc};
use inflow_core::Cursor;
use inflow_storage::{EventRow, EventStore, PendingQuery, Transition, DEFAULT_PAGE_LIMIT};

use crate::error::ApiError;

/// Page size used by each streaming poll.
const STREAM_POLL_LIMIT: i64 = 100;

/// Validated query parameters for an inbox listing.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub since: Option<String>,
    pub topic: Option<String>,
    pub event_type: Option<String>,
    pub cursor: Option<String>,
}

/// One page of inbox events with the token for the next page, if any.
#[derive(Debug)]
pub struct InboxPage {
    pub events: Vec<EventRow>,
    pub next_cursor: Option<String>,
}

pub struct InboxService {
    store: Arc<dyn EventStore>,
}

impl InboxService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, tenant_id: &str, params: ListParams) -> Result<InboxPage, ApiError> {
        let since = params.since.as_deref().map(parse_since).transpose()?;
        // A malformed cursor is a client bug; reject it instead of silently
        // serving the first page the client did not ask for.
        let cursor = params
            .cursor
            .as_deref()
            .map(|raw| Cursor::decode(raw).ok_or_else(|| ApiError::validation("invalid cursor")))
            .transpose()?;

        let page = self
            .store
            .pending_events(PendingQuery {
                tenant_id: tenant_id.to_string(),
                limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
                since,
                topic: params.topic,
                event_type: params.event_type,
                cursor,
            })
            .await?;

        Ok(InboxPage {
            events: page.events,
            next_cursor: page.next.map(|cursor| cursor.encode()),
        })
    }

    /// Acknowledge is idempotent for the client: repeating it against an
    /// already-acknowledged event succeeds; only deleted and absent events
    /// are surfaced as failures.
    pub async fn acknowledge(&self, event_id: uuid::Uuid, tenant_id: &str) -> Result<(), ApiError> {
        match self.store.acknowledge_event(event_id, tenant_id).await? {
            Transition::Applied | Transition::AlreadyInState => Ok(()),
            Transition::Terminal => Err(ApiError::InvalidStateTransition),
            Transition::NotFound => Err(ApiError::NotFound),
        }
    }

    pub async fn delete(&self, event_id: uuid::Uuid, tenant_id: &str) -> Result<(), ApiError> {
        match self.store.delete_event(event_id, tenant_id).await? {
            Transition::Applied => Ok(()),
            Transition::AlreadyInState | Transition::Terminal => Err(ApiError::AlreadyDeleted),
            Transition::NotFound => Err(ApiError::NotFound),
        }
    }

    /// One polling step for the streaming surface: pending events strictly
    /// newer than the watermark, oldest first. The storage filter is
    /// inclusive, so rows created exactly at the watermark are trimmed here.
    pub async fn poll_after(
        &self,
        tenant_id: &str,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<EventRow>, ApiError> {
        let page = self
            .store
            .pending_events(PendingQuery {
                tenant_id: tenant_id.to_string(),
                limit: STREAM_POLL_LIMIT,
                since: Some(watermark),
                topic: None,
                event_type: None,
                cursor: None,
            })
            .await?;

        Ok(page
            .events
            .into_iter()
            .filter(|event| event.created_at > watermark)
            .collect())
    }
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            ApiError::validation(format!(
                "invalid 'since' timestamp: {err}. Use ISO 8601 format."
            ))
        })
}
