use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::client::ChainOrderClient;
use crate::chain::types::ChainOrder;
use crate::error::AppResult;
use crate::orders::repository::OrderRepository;

/// Outcome of a bulk sync pass. `failed` counts orders whose merge failed
/// and were skipped; the pass itself still succeeds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncSummary {
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Reconciles on-chain escrow orders into the local mirror.
///
/// The chain sends no change notifications, so every mutating admin action
/// is followed by `sync_chain_order` (read-after-write), and a periodic
/// `sync_chain_orders` sweep catches everything else.
pub struct ChainSyncService {
    client: Arc<dyn ChainOrderClient>,
    orders: Arc<OrderRepository>,
}

impl ChainSyncService {
    pub fn new(client: Arc<dyn ChainOrderClient>, orders: Arc<OrderRepository>) -> Self {
        Self { client, orders }
    }

    /// Look up one order on chain. Pass `force_refresh` before any mutating
    /// action so the decision is never made on a cached status.
    pub async fn find_chain_order(
        &self,
        order_id: &str,
        force_refresh: bool,
    ) -> AppResult<Option<ChainOrder>> {
        self.client.find_order(order_id, force_refresh).await
    }

    /// Re-fetch a single order (cache bypassed) and merge it into the mirror.
    pub async fn sync_chain_order(&self, order_id: &str) -> AppResult<Option<ChainOrder>> {
        let Some(order) = self.client.find_order(order_id, true).await? else {
            return Ok(None);
        };
        self.orders.upsert_chain_order(&order).await?;
        Ok(Some(order))
    }

    /// Bulk sync for the periodic sweep. A total inability to reach the
    /// chain is fatal to the pass; a single order's merge failure is
    /// recorded and skipped.
    pub async fn sync_chain_orders(&self) -> AppResult<SyncSummary> {
        let orders = self.client.fetch_orders_admin().await?;

        let mut summary = SyncSummary {
            scanned: orders.len(),
            ..Default::default()
        };
        for order in &orders {
            match self.orders.upsert_chain_order(order).await {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!("sync skipped order {}: {:?}", order.order_id, e);
                }
            }
        }

        info!(
            "chain sync: {} scanned, {} updated, {} failed",
            summary.scanned, summary.updated, summary.failed
        );
        Ok(summary)
    }
}
