// Ingestion flow: admission, validation, store delegation
//
// Admission runs before anything reads the body; a malformed or oversized
// request still spends one token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use inflow_storage::{CreateEvent, EventStore};
use uuid::Uuid;

use crate::error::ApiError;
use crate::events::CreateEventRequest;
use crate::ratelimit::RateLimiter;

/// Receipt for an accepted event.
#[derive(Debug, Clone, Copy)]
pub struct Accepted {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
}

pub struct IngestService {
    store: Arc<dyn EventStore>,
    limiter: Arc<RateLimiter>,
    max_payload_bytes: usize,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn EventStore>,
        limiter: Arc<RateLimiter>,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            store,
            limiter,
            max_payload_bytes,
        }
    }

    /// Admission check for one ingestion attempt.
    pub fn admit(&self, tenant_id: &str) -> Result<(), ApiError> {
        if self.limiter.is_allowed(tenant_id) {
            Ok(())
        } else {
            Err(ApiError::RateLimited {
                retry_after_secs: self.limiter.retry_after(tenant_id),
            })
        }
    }

    /// Validate an already-parsed body and persist the event.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        body: serde_json::Value,
        idempotency_key: Option<String>,
    ) -> Result<Accepted, ApiError> {
        let request: CreateEventRequest = serde_json::from_value(body)
            .map_err(|err| ApiError::validation(format!("invalid event body: {err}")))?;

        let payload = serde_json::Value::Object(request.payload);
        let size = serialized_size(&payload)?;
        if size > self.max_payload_bytes {
            return Err(ApiError::validation(format!(
                "payload must be a JSON object and <= {} bytes (got {} bytes)",
                self.max_payload_bytes, size
            )));
        }

        let row = self
            .store
            .create_event(CreateEvent {
                tenant_id: tenant_id.to_string(),
                source: request.source,
                event_type: request.event_type,
                topic: request.topic,
                payload: Some(payload),
                idempotency_key,
            })
            .await?;

        Ok(Accepted {
            id: row.id,
            received_at: row.created_at,
        })
    }
}

/// Byte length of the canonical JSON form, UTF-8 encoded.
fn serialized_size(payload: &serde_json::Value) -> Result<usize, ApiError> {
    serde_json::to_vec(payload)
        .map(|bytes| bytes.len())
        .map_err(|err| ApiError::Internal(err.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inflow_storage::SqliteStore;
    use serde_json::json;

    async fn service(limit_per_minute: u32, max_payload_bytes: usize) -> IngestService {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        IngestService::new(
            store,
            Arc::new(RateLimiter::new(limit_per_minute)),
            max_payload_bytes,
        )
    }

    #[tokio::test]
    async fn test_ingest_accepts_minimal_body() {
        let service = service(60, 1024).await;
        let accepted = service
            .ingest("tenant_a", json!({"payload": {}}), None)
            .await
            .unwrap();
        assert!(accepted.received_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_ingest_rejects_missing_payload() {
        let service = service(60, 1024).await;
        let err = service
            .ingest("tenant_a", json!({"source": "billing"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_object_payload() {
        let service = service(60, 1024).await;
        for payload in [json!("text"), json!(42), json!([1, 2, 3]), json!(null)] {
            let err = service
                .ingest("tenant_a", json!({"payload": payload}), None)
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "payload {payload}");
        }
    }

    #[tokio::test]
    async fn test_ingest_enforces_payload_cap() {
        let service = service(60, 64).await;
        let oversized = json!({"payload": {"blob": "x".repeat(100)}});
        let err = service.ingest("tenant_a", oversized, None).await.unwrap_err();
        match err {
            ApiError::Validation(msg) => assert!(msg.contains("bytes"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_surfaces_idempotency_conflict() {
        let service = service(60, 1024).await;
        let first = service
            .ingest("tenant_a", json!({"payload": {}}), Some("k1".to_string()))
            .await
            .unwrap();
        let err = service
            .ingest("tenant_a", json!({"payload": {}}), Some("k1".to_string()))
            .await
            .unwrap_err();
        match err {
            ApiError::IdempotencyConflict { existing_id } => {
                assert_eq!(existing_id, Some(first.id));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admit_denies_after_budget() {
        let service = service(2, 1024).await;
        assert!(service.admit("tenant_a").is_ok());
        assert!(service.admit("tenant_a").is_ok());
        let err = service.admit("tenant_a").unwrap_err();
        match err {
            ApiError::RateLimited { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected rate limit, got {other:?}"),
        }
        // Another tenant is unaffected.
        assert!(service.admit("tenant_b").is_ok());
    }
}
