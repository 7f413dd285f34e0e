use std::sync::Arc;
use tracing::{error, info};

use crate::chain::client::ChainOrderClient;
use crate::error::AppResult;
use crate::ledger::models::{parse_diamond_amount, CreditOutcome};
use crate::ledger::repository::ReceiptStore;

#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub user_address: String,
    /// Positive integer string; validated before any chain call
    pub amount: String,
    /// Caller-supplied idempotency key, unique per credit
    pub receipt_id: String,
    pub order_id: Option<String>,
    pub memo: Option<String>,
}

/// Credits a user's on-chain diamond balance exactly once per receipt.
///
/// Chain credits are irreversible, so the receipt claim must win before the
/// transaction is sent: the store's uniqueness constraint makes the claim
/// atomic, and a failed chain call releases the claim so the next attempt
/// can retry.
pub struct LedgerService {
    client: Arc<dyn ChainOrderClient>,
    receipts: Arc<dyn ReceiptStore>,
}

impl LedgerService {
    pub fn new(client: Arc<dyn ChainOrderClient>, receipts: Arc<dyn ReceiptStore>) -> Self {
        Self { client, receipts }
    }

    pub async fn credit_with_admin(&self, request: CreditRequest) -> AppResult<CreditOutcome> {
        let amount = parse_diamond_amount(&request.amount)?;

        let claimed = self
            .receipts
            .claim_receipt(
                &request.receipt_id,
                request.order_id.as_deref(),
                &request.user_address,
                amount as i64,
                request.memo.as_deref(),
            )
            .await?;

        if !claimed {
            let existing = self.receipts.get(&request.receipt_id).await?;
            info!(
                "duplicate credit attempt for receipt {}, no transaction issued",
                request.receipt_id
            );
            return Ok(CreditOutcome {
                duplicated: true,
                digest: existing.and_then(|r| r.digest),
            });
        }

        let receipt = match self
            .client
            .credit_balance_admin(&request.user_address, amount)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                // The claim is released so a retry with the same receipt id
                // can still credit; a crash before this point leaves an
                // unsettled row for operators to reconcile.
                error!(
                    "chain credit failed for receipt {}: {:?}",
                    request.receipt_id, e
                );
                self.receipts.release_claim(&request.receipt_id).await?;
                return Err(e);
            }
        };

        self.receipts
            .record_settlement(&request.receipt_id, &receipt.digest)
            .await?;

        info!(
            "credited {} diamonds to {} (receipt {}, digest {})",
            amount, request.user_address, request.receipt_id, receipt.digest
        );

        Ok(CreditOutcome {
            duplicated: false,
            digest: Some(receipt.digest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::chain::types::{ChainOrder, ResolveDisputeRequest, TxReceipt};
    use crate::error::{AppError, ChainError};
    use crate::ledger::models::LedgerCreditReceipt;

    #[derive(Default)]
    struct MemoryReceiptStore {
        rows: Mutex<HashMap<String, LedgerCreditReceipt>>,
    }

    #[async_trait]
    impl ReceiptStore for MemoryReceiptStore {
        async fn claim_receipt(
            &self,
            receipt_id: &str,
            order_id: Option<&str>,
            user_address: &str,
            amount: i64,
            memo: Option<&str>,
        ) -> AppResult<bool> {
            let mut rows = self.rows.lock().await;
            if rows.contains_key(receipt_id) {
                return Ok(false);
            }
            rows.insert(
                receipt_id.to_string(),
                LedgerCreditReceipt {
                    receipt_id: receipt_id.to_string(),
                    order_id: order_id.map(str::to_string),
                    user_address: user_address.to_string(),
                    amount,
                    memo: memo.map(str::to_string),
                    digest: None,
                    created_at: Utc::now(),
                    settled_at: None,
                },
            );
            Ok(true)
        }

        async fn record_settlement(&self, receipt_id: &str, digest: &str) -> AppResult<()> {
            let mut rows = self.rows.lock().await;
            if let Some(row) = rows.get_mut(receipt_id) {
                row.digest = Some(digest.to_string());
                row.settled_at = Some(Utc::now());
            }
            Ok(())
        }

        async fn release_claim(&self, receipt_id: &str) -> AppResult<u64> {
            let mut rows = self.rows.lock().await;
            let unsettled = rows
                .get(receipt_id)
                .map(|row| row.settled_at.is_none())
                .unwrap_or(false);
            if unsettled {
                rows.remove(receipt_id);
                return Ok(1);
            }
            Ok(0)
        }

        async fn get(&self, receipt_id: &str) -> AppResult<Option<LedgerCreditReceipt>> {
            let rows = self.rows.lock().await;
            Ok(rows.get(receipt_id).cloned())
        }
    }

    /// Counts credit transactions; optionally fails the first N of them.
    #[derive(Default)]
    struct MockChain {
        credits: AtomicUsize,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl ChainOrderClient for MockChain {
        async fn find_order(&self, _: &str, _: bool) -> AppResult<Option<ChainOrder>> {
            Ok(None)
        }
        async fn fetch_orders_admin(&self) -> AppResult<Vec<ChainOrder>> {
            Ok(vec![])
        }
        async fn cancel_order_admin(&self, _: &str) -> AppResult<TxReceipt> {
            unimplemented!("not exercised")
        }
        async fn complete_order_admin(&self, _: &str) -> AppResult<TxReceipt> {
            unimplemented!("not exercised")
        }
        async fn finalize_order_admin(&self, _: &str) -> AppResult<TxReceipt> {
            unimplemented!("not exercised")
        }
        async fn resolve_dispute_admin(&self, _: &ResolveDisputeRequest) -> AppResult<TxReceipt> {
            unimplemented!("not exercised")
        }
        async fn credit_balance_admin(&self, _: &str, _: u64) -> AppResult<TxReceipt> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::Chain(ChainError::Gateway {
                    code: -1,
                    message: "gateway down".to_string(),
                }));
            }
            let n = self.credits.fetch_add(1, Ordering::SeqCst);
            Ok(TxReceipt {
                digest: format!("0xdigest{}", n),
                effects: None,
            })
        }
    }

    fn request(receipt_id: &str, amount: &str) -> CreditRequest {
        CreditRequest {
            user_address: "0xuser".to_string(),
            amount: amount.to_string(),
            receipt_id: receipt_id.to_string(),
            order_id: Some("42".to_string()),
            memo: None,
        }
    }

    #[tokio::test]
    async fn test_same_receipt_credits_exactly_once() {
        let chain = Arc::new(MockChain::default());
        let service = LedgerService::new(chain.clone(), Arc::new(MemoryReceiptStore::default()));

        let first = service.credit_with_admin(request("r-1", "100")).await.unwrap();
        assert!(!first.duplicated);
        let digest = first.digest.clone().unwrap();

        let second = service.credit_with_admin(request("r-1", "100")).await.unwrap();
        assert!(second.duplicated);
        assert_eq!(second.digest, Some(digest));

        // exactly one balance change
        assert_eq!(chain.credits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_amount_never_reaches_chain() {
        let chain = Arc::new(MockChain::default());
        let service = LedgerService::new(chain.clone(), Arc::new(MemoryReceiptStore::default()));

        for amount in ["0", "-1", "1.5", "abc"] {
            assert!(service.credit_with_admin(request("r-bad", amount)).await.is_err());
        }
        assert_eq!(chain.credits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_chain_call_releases_claim_for_retry() {
        let chain = Arc::new(MockChain::default());
        chain.fail_first.store(1, Ordering::SeqCst);
        let store = Arc::new(MemoryReceiptStore::default());
        let service = LedgerService::new(chain.clone(), store.clone());

        assert!(service.credit_with_admin(request("r-2", "50")).await.is_err());
        assert!(store.get("r-2").await.unwrap().is_none());

        let retry = service.credit_with_admin(request("r-2", "50")).await.unwrap();
        assert!(!retry.duplicated);
        assert_eq!(chain.credits.load(Ordering::SeqCst), 1);
    }
}
