// Runtime settings loaded from the environment (.env honored in main)

use std::env;
use std::fmt;
use std::str::FromStr;

/// Which storage engine backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    DynamoDb,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Sqlite => f.write_str("sqlite"),
            StorageBackend::DynamoDb => f.write_str("dynamodb"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub app_env: String,
    /// Raw `key=tenant,key=tenant` credential pairs; parsed by the auth layer.
    pub api_keys: String,
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub max_payload_bytes: usize,
    pub rate_limit_per_minute: u32,
    /// How long settled (acknowledged/deleted) events rest before the sweep
    /// removes them physically.
    pub idempotency_ttl_min: i64,
    pub stream_poll_ms: u64,
    pub cors_allowed_origins: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8000,
            app_env: "development".to_string(),
            api_keys: "dev_key_123=tenant_dev".to_string(),
            storage_backend: StorageBackend::Sqlite,
            database_url: "sqlite://data/events.db".to_string(),
            max_payload_bytes: 524_288,
            rate_limit_per_minute: 60,
            idempotency_ttl_min: 60,
            stream_poll_ms: 2_000,
            cors_allowed_origins: None,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Settings {
            port: env_parse("PORT", defaults.port),
            app_env: env::var("APP_ENV").unwrap_or(defaults.app_env),
            api_keys: env::var("API_KEYS").unwrap_or(defaults.api_keys),
            storage_backend: match env::var("STORAGE_BACKEND").ok().as_deref() {
                Some("dynamodb") => StorageBackend::DynamoDb,
                _ => StorageBackend::Sqlite,
            },
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_payload_bytes: env_parse("MAX_PAYLOAD_BYTES", defaults.max_payload_bytes),
            rate_limit_per_minute: env_parse(
                "RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            ),
            idempotency_ttl_min: env_parse("IDEMPOTENCY_TTL_MIN", defaults.idempotency_ttl_min),
            stream_poll_ms: env_parse("STREAM_POLL_MS", defaults.stream_poll_ms),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
