// Inbox HTTP routes: listing, acknowledgment, deletion, and SSE streaming
//
// Streaming design:
// - A server-held watermark starts at connection time; each poll asks the
//   store for pending events past it and advances it to the newest emitted
//   timestamp, so reconnecting clients never see the backlog twice.
// - Poll failures are logged and swallowed; the stream only ends when the
//   peer disconnects, which drops the stream and cancels the loop with it.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use inflow_storage::EventRow;

use crate::auth::Tenant;
use crate::error::ApiError;
use crate::services::inbox::ListParams;
use crate::AppState;

/// Query parameters for inbox listing
#[derive(Debug, Deserialize, IntoParams)]
pub struct InboxQuery {
    /// Maximum number of events to return (1-500, default 50).
    #[param(example = 50)]
    pub limit: Option<i64>,
    /// Only events created at or after this ISO 8601 timestamp.
    pub since: Option<String>,
    /// Filter by event topic.
    pub topic: Option<String>,
    /// Filter by event type.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Opaque pagination token from a previous page.
    pub cursor: Option<String>,
}

/// One event in an inbox listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub topic: Option<String>,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

impl EventItem {
    fn from_row(row: &EventRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            source: row.source.clone(),
            event_type: row.event_type.clone(),
            topic: row.topic.clone(),
            payload: row.payload.clone(),
        }
    }
}

/// Inbox listing with the token for the next page, if any.
#[derive(Debug, Serialize, ToSchema)]
pub struct InboxResponse {
    pub events: Vec<EventItem>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AckResponse {
    pub id: Uuid,
    #[schema(example = "acknowledged")]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub id: Uuid,
    #[schema(example = "deleted")]
    pub status: String,
}

/// Create inbox routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/inbox", get(list_inbox))
        .route("/v1/inbox/stream", get(stream_inbox))
        .route("/v1/inbox/:event_id/ack", post(acknowledge_event))
        .route("/v1/inbox/:event_id", delete(delete_event))
        .with_state(state)
}

/// GET /v1/inbox - List undelivered events
///
/// Filters compose conjunctively; iteration uses cursor-based pagination.
/// Chain `next_cursor` until it is null to drain the inbox.
#[utoipa::path(
    get,
    path = "/v1/inbox",
    params(InboxQuery),
    responses(
        (status = 200, description = "Pending events with pagination info", body = InboxResponse),
        (status = 400, description = "Invalid query parameter or cursor"),
        (status = 401, description = "Missing or invalid API key")
    ),
    tag = "inbox"
)]
pub async fn list_inbox(
    State(state): State<AppState>,
    tenant: Tenant,
    query: Result<Query<InboxQuery>, QueryRejection>,
) -> Result<Json<InboxResponse>, ApiError> {
    let Query(query) =
        query.map_err(|err| ApiError::validation(format!("invalid query parameter: {err}")))?;
    let page = state
        .inbox
        .list(
            &tenant.0,
            ListParams {
                limit: query.limit,
                since: query.since,
                topic: query.topic,
                event_type: query.event_type,
                cursor: query.cursor,
            },
        )
        .await?;

    Ok(Json(InboxResponse {
        events: page.events.iter().map(EventItem::from_row).collect(),
        next_cursor: page.next_cursor,
    }))
}

/// POST /v1/inbox/{event_id}/ack - Acknowledge an event
///
/// Idempotent: re-acknowledging an already-acknowledged event succeeds.
#[utoipa::path(
    post,
    path = "/v1/inbox/{event_id}/ack",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event acknowledged", body = AckResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Event not found for this tenant"),
        (status = 409, description = "Event is deleted")
    ),
    tag = "inbox"
)]
pub async fn acknowledge_event(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AckResponse>, ApiError> {
    state.inbox.acknowledge(event_id, &tenant.0).await?;
    Ok(Json(AckResponse {
        id: event_id,
        status: "acknowledged".to_string(),
    }))
}

/// DELETE /v1/inbox/{event_id} - Remove an event from the inbox
#[utoipa::path(
    delete,
    path = "/v1/inbox/{event_id}",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event deleted", body = DeleteResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Event not found for this tenant"),
        (status = 409, description = "Event is already deleted")
    ),
    tag = "inbox"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(event_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.inbox.delete(event_id, &tenant.0).await?;
    Ok(Json(DeleteResponse {
        id: event_id,
        status: "deleted".to_string(),
    }))
}

/// GET /v1/inbox/stream - Stream new events (SSE)
///
/// Emits one `message` event per new pending event plus periodic
/// keep-alives. Because EventSource cannot set headers, the API key may be
/// passed as an `api_key` query parameter on this surface.
#[utoipa::path(
    get,
    path = "/v1/inbox/stream",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid API key")
    ),
    tag = "inbox"
)]
pub async fn stream_inbox(
    State(state): State<AppState>,
    tenant: Tenant,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let tenant_id = tenant.0;
    let inbox = state.inbox.clone();
    let poll_interval = Duration::from_millis(state.settings.stream_poll_ms);
    tracing::info!(tenant_id = %tenant_id, "starting inbox stream");

    let stream = stream::unfold(Utc::now(), move |watermark| {
        let inbox = inbox.clone();
        let tenant_id = tenant_id.clone();
        async move {
            tokio::time::sleep(poll_interval).await;
            match inbox.poll_after(&tenant_id, watermark).await {
                Ok(events) if !events.is_empty() => {
                    let advanced = events
                        .last()
                        .map(|event| event.created_at)
                        .unwrap_or(watermark);

                    let sse_events: Vec<Result<SseEvent, Infallible>> = events
                        .iter()
                        .map(|event| {
                            let data = serde_json::to_string(&EventItem::from_row(event))
                                .unwrap_or_else(|_| "{}".to_string());
                            Ok(SseEvent::default()
                                .event("message")
                                .id(event.id.to_string())
                                .data(data))
                        })
                        .collect();

                    Some((stream::iter(sse_events), advanced))
                }
                Ok(_) => Some((stream::iter(vec![]), watermark)),
                Err(err) => {
                    // A transient backend failure must not end the stream;
                    // the next tick retries.
                    tracing::warn!(tenant_id = %tenant_id, "inbox stream poll failed: {err}");
                    Some((stream::iter(vec![]), watermark))
                }
            }
        }
    })
    .flatten();

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text(json!({"type": "heartbeat"}).to_string()),
    )
}
