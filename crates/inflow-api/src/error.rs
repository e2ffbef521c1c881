// Error types for the API surface
//
// Domain errors are raised close to their source (store or service layer)
// and mapped exactly once, here, to the stable wire vocabulary:
// `{"error": {"code", "message", ...}}`. Internal failures are logged with
// full detail server-side and surfaced as a generic message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use inflow_storage::StoreError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing fields, oversized payload, invalid query
    /// parameters or cursor. Carries the specific reason for the client.
    #[error("{0}")]
    Validation(String),

    #[error("API key required")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    /// Another non-deleted event already holds the idempotency key.
    #[error("an event with this idempotency key already exists")]
    IdempotencyConflict { existing_id: Option<Uuid> },

    /// Referenced event absent or owned by another tenant.
    #[error("event not found")]
    NotFound,

    /// Acknowledge attempted on a deleted event.
    #[error("cannot acknowledge a deleted event")]
    InvalidStateTransition,

    /// Delete attempted on an already-deleted event.
    #[error("event is already deleted")]
    AlreadyDeleted,

    /// Anything unexpected; details stay server-side.
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::IdempotencyConflict { .. }
            | ApiError::InvalidStateTransition
            | ApiError::AlreadyDeleted => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::MissingApiKey | ApiError::InvalidApiKey => "AUTHENTICATION_ERROR",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::IdempotencyConflict { .. } => "IDEMPOTENCY_CONFLICT",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ApiError::AlreadyDeleted => "ALREADY_DELETED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IdempotencyConflict { existing_id } => {
                ApiError::IdempotencyConflict { existing_id }
            }
            StoreError::InvalidInput(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(source) = &self {
            tracing::error!(error = ?source, "request failed");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let ApiError::IdempotencyConflict {
            existing_id: Some(id),
        } = &self
        {
            error["existing_event_id"] = json!(id);
        }
        if let ApiError::RateLimited { retry_after_secs } = &self {
            error["retry_after"] = json!(retry_after_secs);
        }

        let mut response = (self.status(), Json(json!({ "error": error }))).into_response();
        match &self {
            ApiError::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            ApiError::MissingApiKey | ApiError::InvalidApiKey => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }
        response
    }
}
