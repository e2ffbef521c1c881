// Event ingestion HTTP route

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Tenant;
use crate::error::ApiError;
use crate::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Request body for event creation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Producing system (e.g. "billing").
    #[serde(default)]
    #[schema(example = "billing")]
    pub source: Option<String>,
    /// Event type (e.g. "invoice.paid").
    #[serde(default, rename = "type")]
    #[schema(example = "invoice.paid")]
    pub event_type: Option<String>,
    /// Routing topic (e.g. "finance").
    #[serde(default)]
    #[schema(example = "finance")]
    pub topic: Option<String>,
    /// Event data. Must be a JSON object.
    #[schema(value_type = Object, example = json!({"invoiceId": "inv_123", "amount": 4200}))]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Acknowledgment returned for an accepted event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    #[schema(example = "accepted")]
    pub status: String,
}

/// Create event routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(create_event))
        .with_state(state)
}

/// POST /v1/events - Ingest a new event
///
/// Rate limited per tenant. Supports safe retries via the
/// `X-Idempotency-Key` header: a retried request whose key already landed
/// gets a conflict carrying the existing event id.
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = CreateEventRequest,
    responses(
        (status = 200, description = "Event accepted", body = EventResponse),
        (status = 400, description = "Malformed body or invalid payload"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 409, description = "Idempotency key already used"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    tenant: Tenant,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<EventResponse>, ApiError> {
    // Admission comes first; a malformed body still spends a token.
    state.ingest.admit(&tenant.0)?;

    let Json(body) =
        body.map_err(|err| ApiError::validation(format!("malformed JSON body: {err}")))?;
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let accepted = state.ingest.ingest(&tenant.0, body, idempotency_key).await?;

    Ok(Json(EventResponse {
        id: accepted.id,
        received_at: accepted.received_at,
        status: "accepted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_event_request_minimal() {
        let req: CreateEventRequest = serde_json::from_str(r#"{"payload": {}}"#).unwrap();
        assert_eq!(req.source, None);
        assert_eq!(req.event_type, None);
        assert_eq!(req.topic, None);
        assert!(req.payload.is_empty());
    }

    #[test]
    fn test_create_event_request_full() {
        let json = r#"{
            "source": "billing",
            "type": "invoice.paid",
            "topic": "finance",
            "payload": {"invoiceId": "inv_123", "amount": 4200}
        }"#;
        let req: CreateEventRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.source.as_deref(), Some("billing"));
        assert_eq!(req.event_type.as_deref(), Some("invoice.paid"));
        assert_eq!(req.topic.as_deref(), Some("finance"));
        assert_eq!(req.payload["amount"], 4200);
    }

    #[test]
    fn test_create_event_request_requires_payload() {
        assert!(serde_json::from_str::<CreateEventRequest>(r#"{}"#).is_err());
        assert!(
            serde_json::from_str::<CreateEventRequest>(r#"{"payload": "text"}"#).is_err(),
            "payload must be an object"
        );
        assert!(serde_json::from_str::<CreateEventRequest>(r#"{"payload": [1]}"#).is_err());
    }
}
