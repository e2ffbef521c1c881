// SQLite implementation of the event store (production engine)
//
// Idempotency is enforced by a partial unique index over
// (tenant_id, idempotency_key) on non-deleted rows, so concurrent creates
// sharing a key resolve at write time: one insert lands, the rest observe a
// unique violation and report a conflict. The application-level lookup
// before the insert is only a fast path.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use inflow_core::EventStatus;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{
    CreateEvent, EventRow, PendingPage, PendingQuery, Transition, MAX_PAGE_LIMIT,
};
use crate::store::EventStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id              BLOB PRIMARY KEY,
    tenant_id       TEXT NOT NULL,
    source          TEXT,
    type            TEXT,
    topic           TEXT,
    payload         TEXT NOT NULL,
    delivered       INTEGER NOT NULL DEFAULT 0,
    status          TEXT NOT NULL DEFAULT 'pending',
    idempotency_key TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_events_tenant_idempotency
    ON events (tenant_id, idempotency_key)
    WHERE idempotency_key IS NOT NULL AND status != 'deleted';

CREATE INDEX IF NOT EXISTS idx_events_pending_scan
    ON events (tenant_id, status, created_at, id);
"#;

const EVENT_COLUMNS: &str = "id, tenant_id, source, type, topic, payload, delivered, status, \
                             idempotency_key, created_at, updated_at";

/// SQLite-backed event store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (and create if missing) the database at a `sqlite://` URL.
    pub async fn connect(url: &str) -> Result<Self> {
        ensure_parent_dir(url);
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Fresh single-connection in-memory database, already initialized.
    /// Used by tests and local experiments.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Insert timestamps are truncated to microseconds so a stored position
/// survives a cursor round trip unchanged.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

/// The file's directory must exist before SQLite can create the file.
fn ensure_parent_dir(url: &str) {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if path.contains(":memory:") || path.is_empty() {
        return;
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn initialize(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn create_event(&self, input: CreateEvent) -> Result<EventRow> {
        if input.tenant_id.is_empty() {
            return Err(StoreError::invalid("tenant_id is required"));
        }

        // Fast path; the partial unique index is the authority under
        // concurrency.
        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(existing) = self.get_by_idempotency(&input.tenant_id, key).await? {
                return Err(StoreError::IdempotencyConflict {
                    existing_id: Some(existing.id),
                });
            }
        }

        let now = now_micros();
        let payload = input
            .payload
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        let inserted = sqlx::query_as::<_, EventRow>(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, 0, 'pending', ?, ?, ?) \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&input.tenant_id)
        .bind(&input.source)
        .bind(&input.event_type)
        .bind(&input.topic)
        .bind(payload)
        .bind(&input.idempotency_key)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => {
                // Lost the race to a concurrent create; report the winner.
                let existing = match input.idempotency_key.as_deref() {
                    Some(key) => self.get_by_idempotency(&input.tenant_id, key).await?,
                    None => None,
                };
                Err(StoreError::IdempotencyConflict {
                    existing_id: existing.map(|row| row.id),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_event_by_id(&self, event_id: Uuid, tenant_id: &str) -> Result<Option<EventRow>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE id = ? AND tenant_id = ? AND status != 'deleted'"
        ))
        .bind(event_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_by_idempotency(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<EventRow>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE tenant_id = ? AND idempotency_key = ? AND status != 'deleted'"
        ))
        .bind(tenant_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn pending_events(&self, query: PendingQuery) -> Result<PendingPage> {
        let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
        let (cursor_ts, cursor_id) = match query.cursor {
            Some(cursor) => (Some(cursor.created_at), Some(cursor.id)),
            None => (None, None),
        };

        // The cursor predicate is what keeps keyset pagination correct when
        // several rows share a timestamp: strictly-later rows, or same-time
        // rows with a larger id.
        let mut events = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE tenant_id = ?1 \
               AND status = 'pending' \
               AND delivered = 0 \
               AND (?2 IS NULL OR created_at >= ?2) \
               AND (?3 IS NULL OR topic = ?3) \
               AND (?4 IS NULL OR type = ?4) \
               AND (?5 IS NULL OR created_at > ?5 OR (created_at = ?5 AND id > ?6)) \
             ORDER BY created_at ASC, id ASC \
             LIMIT ?7"
        ))
        .bind(&query.tenant_id)
        .bind(query.since)
        .bind(&query.topic)
        .bind(&query.event_type)
        .bind(cursor_ts)
        .bind(cursor_id)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await?;

        // One extra row fetched only to learn whether another page exists.
        let next = if events.len() as i64 > limit {
            events.truncate(limit as usize);
            events.last().map(EventRow::cursor)
        } else {
            None
        };

        Ok(PendingPage { events, next })
    }

    async fn acknowledge_event(&self, event_id: Uuid, tenant_id: &str) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE events \
             SET status = 'acknowledged', delivered = 1, updated_at = ? \
             WHERE id = ? AND tenant_id = ? AND status = 'pending' \
             RETURNING id",
        )
        .bind(now_micros())
        .bind(event_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = if updated.is_some() {
            Transition::Applied
        } else {
            // No pending row matched; read the current state inside the same
            // transaction to tell "already acknowledged" from "deleted" from
            // "absent" without racing a concurrent transition.
            let status = sqlx::query_scalar::<_, String>(
                "SELECT status FROM events WHERE id = ? AND tenant_id = ?",
            )
            .bind(event_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;

            match status.as_deref().and_then(|s| s.parse::<EventStatus>().ok()) {
                Some(EventStatus::Acknowledged) => Transition::AlreadyInState,
                Some(EventStatus::Deleted) => Transition::Terminal,
                _ => Transition::NotFound,
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_event(&self, event_id: Uuid, tenant_id: &str) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE events \
             SET status = 'deleted', updated_at = ? \
             WHERE id = ? AND tenant_id = ? AND status IN ('pending', 'acknowledged') \
             RETURNING id",
        )
        .bind(now_micros())
        .bind(event_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = if updated.is_some() {
            Transition::Applied
        } else {
            let status = sqlx::query_scalar::<_, String>(
                "SELECT status FROM events WHERE id = ? AND tenant_id = ?",
            )
            .bind(event_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;

            match status.as_deref().and_then(|s| s.parse::<EventStatus>().ok()) {
                Some(EventStatus::Deleted) => Transition::Terminal,
                _ => Transition::NotFound,
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn cleanup_old_events(&self, ttl_minutes: i64, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - chrono::Duration::minutes(ttl_minutes);
        let result = sqlx::query(
            "DELETE FROM events \
             WHERE status IN ('acknowledged', 'deleted') AND updated_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tracing::debug!(removed, "purged settled events");
        }
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
