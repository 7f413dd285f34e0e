use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;

use crate::audit::models::AuditLog;
use crate::error::AppResult;
use crate::pagination::Cursor;

/// Append-only audit trail.
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        actor: &str,
        action: &str,
        detail: serde_json::Value,
    ) -> AppResult<AuditLog> {
        let entry = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (actor, action, detail)
            VALUES ($1, $2, $3)
            RETURNING id, actor, action, detail, created_at
            "#,
        )
        .bind(actor)
        .bind(action)
        .bind(detail)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Keyset-paginated trail, newest first, tie-broken by id.
    pub async fn list(
        &self,
        action: Option<&str>,
        cursor: Option<&Cursor>,
        limit: i64,
    ) -> AppResult<Vec<AuditLog>> {
        let cursor_at: Option<DateTime<Utc>> =
            cursor.and_then(|c| Utc.timestamp_millis_opt(c.created_at).single());
        let cursor_id = cursor.map(|c| c.id.clone()).unwrap_or_default();

        let entries = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, actor, action, detail, created_at
            FROM audit_logs
            WHERE ($1::text IS NULL OR action = $1)
              AND ($2::timestamptz IS NULL OR (created_at, id::text) < ($2, $3))
            ORDER BY created_at DESC, id::text DESC
            LIMIT $4
            "#,
        )
        .bind(action)
        .bind(cursor_at)
        .bind(cursor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
