use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::chain::types::ChainOrder;
use crate::error::AppResult;
use crate::orders::missing::OrderSnapshot;
use crate::orders::models::{LocalOrder, OrderSource};
use crate::pagination::Cursor;

const ORDER_COLUMNS: &str = "id, source, status, chain_status, buyer_address, companion_id, \
                             price, deposit, meta, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct OrderListFilter {
    pub source: Option<OrderSource>,
    pub status: Option<i16>,
}

/// Repository over the local order mirror.
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<LocalOrder>> {
        let order = sqlx::query_as::<_, LocalOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    /// Merge a freshly observed chain order into the mirror. One statement so
    /// concurrent syncs cannot interleave a regression: GREATEST keeps the
    /// most advanced status either writer saw, and the legacy
    /// `meta.chain.status` location is kept in step for older readers.
    pub async fn upsert_chain_order(&self, order: &ChainOrder) -> AppResult<()> {
        let created_at = order
            .created_at_ms()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO orders (id, source, status, chain_status, buyer_address, companion_id,
                                price, deposit, meta, created_at)
            VALUES ($1, 'chain', $2, $2, $3, $4, $5, $6,
                    jsonb_build_object('chain', jsonb_build_object('status', $2::smallint)),
                    $7)
            ON CONFLICT (id) DO UPDATE SET
                status = GREATEST(orders.status, EXCLUDED.status),
                chain_status = GREATEST(orders.chain_status, EXCLUDED.chain_status),
                meta = orders.meta || jsonb_build_object('chain',
                    COALESCE(orders.meta->'chain', '{}'::jsonb) ||
                    jsonb_build_object('status',
                        GREATEST(orders.chain_status, EXCLUDED.chain_status))),
                updated_at = NOW()
            "#,
        )
        .bind(&order.order_id)
        .bind(order.status.as_i16())
        .bind(&order.buyer)
        .bind(&order.companion)
        .bind(order.price as i64)
        .bind(order.deposit as i64)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Keyset-paginated admin listing over (created_at DESC, id DESC).
    pub async fn list(
        &self,
        filter: &OrderListFilter,
        cursor: Option<&Cursor>,
        limit: i64,
    ) -> AppResult<Vec<LocalOrder>> {
        let cursor_at: Option<DateTime<Utc>> = cursor
            .and_then(|c| Utc.timestamp_millis_opt(c.created_at).single());
        let cursor_id = cursor.map(|c| c.id.clone()).unwrap_or_default();

        let orders = sqlx::query_as::<_, LocalOrder>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::text IS NULL OR source = $1)
              AND ($2::smallint IS NULL OR status = $2 OR chain_status = $2)
              AND ($3::timestamptz IS NULL OR (created_at, id) < ($3, $4))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "#
        ))
        .bind(filter.source.map(|s| s.as_str()))
        .bind(filter.status)
        .bind(cursor_at)
        .bind(cursor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Lightweight snapshot of every row for the missing-order computation.
    pub async fn snapshots(&self) -> AppResult<Vec<OrderSnapshot>> {
        let rows = sqlx::query_as::<_, (String, OrderSource, DateTime<Utc>)>(
            "SELECT id, source, created_at FROM orders ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, source, created_at)| OrderSnapshot {
                id,
                source,
                created_at_ms: created_at.timestamp_millis(),
            })
            .collect())
    }

    /// Purge mirror rows by id. With `chain_only` the statement re-checks
    /// provenance so only chain-sourced rows can be deleted, whatever the
    /// caller computed.
    pub async fn delete_orders(&self, ids: &[String], chain_only: bool) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "DELETE FROM orders WHERE id = ANY($1) AND (NOT $2 OR source = 'chain')",
        )
        .bind(ids.to_vec())
        .bind(chain_only)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record an app-placed booking before it reaches the chain. App ids are
    /// prefixed so they can never collide with (or be mistaken for) chain
    /// order ids.
    pub async fn create_app_order(
        &self,
        buyer_address: Option<&str>,
        companion_id: Option<&str>,
        price: i64,
        deposit: i64,
    ) -> AppResult<LocalOrder> {
        let id = format!("ORD-{}", Uuid::new_v4().simple());
        let order = sqlx::query_as::<_, LocalOrder>(&format!(
            r#"
            INSERT INTO orders (id, source, status, buyer_address, companion_id, price, deposit)
            VALUES ($1, 'app', 0, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(buyer_address)
        .bind(companion_id)
        .bind(price)
        .bind(deposit)
        .fetch_one(&self.pool)
        .await?;
        Ok(order)
    }
}
