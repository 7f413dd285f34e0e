use sqlx::PgPool;
use tracing::warn;

use crate::error::AppResult;

pub const LOCK_AUTO_CANCEL: &str = "chain-auto-cancel";
pub const LOCK_AUTO_FINALIZE: &str = "chain-auto-finalize";
pub const LOCK_CHAIN_SYNC: &str = "chain-sync";

/// Distributed cron lock over a Postgres row.
///
/// Acquisition is one atomic statement: insert the row, or take over a lock
/// whose TTL has lapsed. Contention returns false — a sweep skips its cycle
/// rather than waiting, since the next scheduled run will pick the work up.
pub struct CronLockStore {
    pool: PgPool,
}

impl CronLockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Try to take the named lock for `ttl_ms`. False means another holder
    /// currently has it.
    pub async fn acquire(&self, name: &str, ttl_ms: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO cron_locks (name, expires_at, locked_at)
            VALUES ($1, NOW() + make_interval(secs => $2::double precision / 1000.0), NOW())
            ON CONFLICT (name) DO UPDATE
                SET expires_at = EXCLUDED.expires_at,
                    locked_at = NOW()
                WHERE cron_locks.expires_at < NOW()
            "#,
        )
        .bind(name)
        .bind(ttl_ms)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Best-effort release; the TTL covers holders that never get here.
    pub async fn release(&self, name: &str) {
        if let Err(e) = sqlx::query("DELETE FROM cron_locks WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
        {
            warn!("failed to release cron lock '{}': {:?}", name, e);
        }
    }
}
