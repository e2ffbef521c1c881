// Inflow API server
// Decision: tenancy is a flat API-key map from the environment
// Decision: SQLite is the production storage engine; DynamoDB stays a skeleton
// Decision: the rate limiter is an injected service handle, not a global

mod auth;
mod config;
mod error;
mod events;
mod health;
mod inbox;
mod ratelimit;
mod services;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use inflow_storage::{DynamoStore, EventStore, SqliteStore};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::auth::ApiKeyMap;
use crate::config::{Settings, StorageBackend};
use crate::ratelimit::RateLimiter;
use crate::services::{InboxService, IngestService};

/// How often the background sweep purges settled events.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

const REQUEST_ID_HEADER: &str = "x-request-id";

/// App state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub api_keys: Arc<ApiKeyMap>,
    pub ingest: Arc<IngestService>,
    pub inbox: Arc<InboxService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EventStore>,
        limiter: Arc<RateLimiter>,
        api_keys: ApiKeyMap,
        settings: Settings,
    ) -> Self {
        Self {
            ingest: Arc::new(IngestService::new(
                store.clone(),
                limiter,
                settings.max_payload_bytes,
            )),
            inbox: Arc::new(InboxService::new(store.clone())),
            api_keys: Arc::new(api_keys),
            settings: Arc::new(settings),
            store,
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        events::create_event,
        inbox::list_inbox,
        inbox::acknowledge_event,
        inbox::delete_event,
        inbox::stream_inbox,
        health::health,
        health::detailed_health,
    ),
    components(
        schemas(
            events::CreateEventRequest,
            events::EventResponse,
            inbox::EventItem,
            inbox::InboxResponse,
            inbox::AckResponse,
            inbox::DeleteResponse,
            health::HealthResponse,
        )
    ),
    tags(
        (name = "events", description = "Event ingestion endpoints"),
        (name = "inbox", description = "Event retrieval, acknowledgment, and streaming endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Inflow API",
        version = "0.2.0",
        description = "Unified, real-time event ingestion and delivery API",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("inflow-api starting...");

    let settings = Settings::from_env();

    // Initialize storage
    let store: Arc<dyn EventStore> = match settings.storage_backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteStore::connect(&settings.database_url)
                .await
                .context("Failed to open database")?,
        ),
        StorageBackend::DynamoDb => Arc::new(DynamoStore::new()),
    };
    store
        .initialize()
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = %settings.storage_backend, "Storage backend initialized");

    // Purge anything that settled past the TTL while the process was down,
    // then keep sweeping in the background.
    match store
        .cleanup_old_events(settings.idempotency_ttl_min, Utc::now())
        .await
    {
        Ok(removed) if removed > 0 => {
            tracing::info!(removed, "startup sweep purged settled events")
        }
        Ok(_) => {}
        Err(err) => tracing::warn!("startup sweep failed: {err}"),
    }
    spawn_cleanup_sweep(store.clone(), settings.idempotency_ttl_min);

    let limiter = Arc::new(RateLimiter::new(settings.rate_limit_per_minute));

    let api_keys = ApiKeyMap::parse(&settings.api_keys);
    if api_keys.is_empty() {
        tracing::warn!("API_KEYS is empty; every authenticated request will be rejected");
    } else {
        tracing::info!(keys = api_keys.len(), "API key map loaded");
    }

    // Load CORS allowed origins (optional; only needed when a browser UI is
    // served from a different origin than the API)
    let cors_origins: Vec<HeaderValue> = settings
        .cors_allowed_origins
        .as_deref()
        .map(|origins| {
            origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default();
    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    let port = settings.port;
    let app = build_app(AppState::new(store, limiter, api_keys, settings));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::CACHE_CONTROL,
                    header::HeaderName::from_static(auth::API_KEY_HEADER),
                    header::HeaderName::from_static(events::IDEMPOTENCY_KEY_HEADER),
                ])
                .allow_credentials(true),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Build the application router (extracted for testing)
fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(health::routes(state.clone()))
        .merge(events::routes(state.clone()))
        .merge(inbox::routes(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_id))
}

/// Root endpoint with basic API information
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Inflow Events API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/swagger-ui",
        "health": "/health",
        "events": "/v1/events",
        "inbox": "/v1/inbox",
    }))
}

/// Tag every response with a request id for log correlation.
async fn request_id(request: Request, next: Next) -> Response {
    let id = Uuid::now_v7();
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn spawn_cleanup_sweep(store: Arc<dyn EventStore>, ttl_minutes: i64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.cleanup_old_events(ttl_minutes, Utc::now()).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "sweep purged settled events")
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("cleanup sweep failed: {err}"),
            }
        }
    });
}
