use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::ledger::models::LedgerCreditReceipt;

const RECEIPT_COLUMNS: &str =
    "receipt_id, order_id, user_address, amount, memo, digest, created_at, settled_at";

/// Storage contract for credit receipts. The implementation must make
/// `claim_receipt` atomic on receipt_id uniqueness — a check-then-insert
/// pair would open a double-credit race.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Atomically claim a receipt id. Returns false when a credit with this
    /// receipt id already exists (duplicate attempt).
    async fn claim_receipt(
        &self,
        receipt_id: &str,
        order_id: Option<&str>,
        user_address: &str,
        amount: i64,
        memo: Option<&str>,
    ) -> AppResult<bool>;

    /// Write back the chain digest once the credit transaction landed.
    async fn record_settlement(&self, receipt_id: &str, digest: &str) -> AppResult<()>;

    /// Release a claim whose chain call failed so the same receipt id can be
    /// retried. Settled claims are never released.
    async fn release_claim(&self, receipt_id: &str) -> AppResult<u64>;

    async fn get(&self, receipt_id: &str) -> AppResult<Option<LedgerCreditReceipt>>;
}

/// Postgres-backed receipt store. Idempotency rests on the UNIQUE
/// constraint over receipt_id.
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptStore for LedgerRepository {
    async fn claim_receipt(
        &self,
        receipt_id: &str,
        order_id: Option<&str>,
        user_address: &str,
        amount: i64,
        memo: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_credits (receipt_id, order_id, user_address, amount, memo)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (receipt_id) DO NOTHING
            "#,
        )
        .bind(receipt_id)
        .bind(order_id)
        .bind(user_address)
        .bind(amount)
        .bind(memo)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_settlement(&self, receipt_id: &str, digest: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE ledger_credits SET digest = $2, settled_at = NOW() WHERE receipt_id = $1",
        )
        .bind(receipt_id)
        .bind(digest)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_claim(&self, receipt_id: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM ledger_credits WHERE receipt_id = $1 AND settled_at IS NULL",
        )
        .bind(receipt_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, receipt_id: &str) -> AppResult<Option<LedgerCreditReceipt>> {
        let receipt = sqlx::query_as::<_, LedgerCreditReceipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM ledger_credits WHERE receipt_id = $1"
        ))
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(receipt)
    }
}
