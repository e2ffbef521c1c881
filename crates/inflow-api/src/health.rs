// Health check HTTP routes

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::AppState;

const SERVICE_NAME: &str = "inflow-api";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Create health routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
        .with_state(state)
}

/// GET /health - Basic liveness probe (no auth)
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/detailed - Health with component diagnostics (no auth)
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses((status = 200, description = "Detailed health information")),
    tag = "health"
)]
pub async fn detailed_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let storage_healthy = state.store.health_check().await;
    let status = if storage_healthy { "healthy" } else { "unhealthy" };

    Json(json!({
        "status": status,
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.settings.app_env,
        "components": {
            "storage": {
                "type": state.settings.storage_backend.to_string(),
                "status": if storage_healthy { "healthy" } else { "unhealthy" },
            }
        }
    }))
}
