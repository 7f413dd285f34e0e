use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One operational trail entry. `actor` distinguishes automated sweeps
/// ("cron") from manual admin actions ("admin"); `detail` carries the
/// effective config and outcome counts of the action.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
