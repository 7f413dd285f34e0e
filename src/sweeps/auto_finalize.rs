use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audit::AuditRepository;
use crate::chain::client::ChainOrderClient;
use crate::chain::status::OrderStatus;
use crate::chain::types::ChainOrder;
use crate::config::SweepConfig;
use crate::error::AppResult;
use crate::orders::sync::ChainSyncService;

const HOUR_MS: i64 = 3_600_000;

/// A deposited order whose service window has lapsed can be completed.
/// Created/Paid stragglers belong to the auto-cancel sweep, disputes go
/// through resolution, terminal states are final.
pub fn is_auto_completable(order: &ChainOrder, now_ms: i64, window_ms: i64) -> bool {
    if order.status != OrderStatus::Deposited {
        return false;
    }
    match order.created_at_ms() {
        Some(created_at) => now_ms - created_at > window_ms,
        None => false,
    }
}

pub fn pick_auto_completable(
    orders: &[ChainOrder],
    now_ms: i64,
    window_ms: i64,
    limit: usize,
) -> Vec<&ChainOrder> {
    orders
        .iter()
        .filter(|order| is_auto_completable(order, now_ms, window_ms))
        .take(limit)
        .collect()
}

/// Completed orders whose escrow is still held, oldest first, bounded.
pub fn pick_finalizable(orders: &[ChainOrder], limit: usize) -> Vec<&ChainOrder> {
    orders
        .iter()
        .filter(|order| order.status == OrderStatus::Completed)
        .take(limit)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoFinalizeOptions {
    pub dry_run: bool,
    pub complete_limit: Option<usize>,
    pub finalize_limit: Option<usize>,
}

/// Phase counts are reported separately so operators can tell "nothing to
/// complete" from "completion happened but finalize failed". All numeric
/// fields are present even when a phase is disabled.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AutoFinalizeOutcome {
    pub ok: bool,
    pub enabled: bool,
    pub complete_enabled: bool,
    pub finalize_enabled: bool,
    pub hours: u32,
    pub complete_candidates: usize,
    pub completed: usize,
    pub finalize_candidates: usize,
    pub finalized: usize,
}

/// Two-phase settlement sweep: complete orders past the service window,
/// then release escrow for completed orders. Phases are independently
/// switchable and limited; both are best-effort per candidate.
pub struct AutoFinalizeSweep {
    client: Arc<dyn ChainOrderClient>,
    sync: Arc<ChainSyncService>,
    audit: Arc<AuditRepository>,
    config: SweepConfig,
}

impl AutoFinalizeSweep {
    pub fn new(
        client: Arc<dyn ChainOrderClient>,
        sync: Arc<ChainSyncService>,
        audit: Arc<AuditRepository>,
        config: SweepConfig,
    ) -> Self {
        Self {
            client,
            sync,
            audit,
            config,
        }
    }

    pub async fn run(
        &self,
        actor: &str,
        options: AutoFinalizeOptions,
    ) -> AppResult<AutoFinalizeOutcome> {
        let hours = self.config.service_window_hours;
        let complete_enabled = self.config.auto_complete_enabled;
        let finalize_enabled = self.config.auto_finalize_enabled;

        let mut outcome = AutoFinalizeOutcome {
            ok: true,
            enabled: complete_enabled || finalize_enabled,
            complete_enabled,
            finalize_enabled,
            hours,
            complete_candidates: 0,
            completed: 0,
            finalize_candidates: 0,
            finalized: 0,
        };

        if !outcome.enabled {
            self.record(actor, &options, &outcome).await;
            return Ok(outcome);
        }

        let orders = self.client.fetch_orders_admin().await?;
        let now_ms = Utc::now().timestamp_millis();

        // Phase 1: complete orders past the service window
        let mut just_completed: Vec<String> = Vec::new();
        if complete_enabled {
            let limit = options.complete_limit.unwrap_or(self.config.complete_limit);
            let window_ms = i64::from(hours) * HOUR_MS;
            let candidates = pick_auto_completable(&orders, now_ms, window_ms, limit);
            outcome.complete_candidates = candidates.len();

            if !options.dry_run {
                for order in &candidates {
                    match self.client.complete_order_admin(&order.order_id).await {
                        Ok(receipt) => {
                            outcome.completed += 1;
                            just_completed.push(order.order_id.clone());
                            info!(
                                "auto-finalize: order {} completed ({})",
                                order.order_id, receipt.digest
                            );
                            if let Err(e) = self.sync.sync_chain_order(&order.order_id).await {
                                warn!(
                                    "auto-finalize: resync of order {} failed: {:?}",
                                    order.order_id, e
                                );
                            }
                        }
                        Err(e) => {
                            error!("auto-finalize: complete {} failed: {:?}", order.order_id, e);
                        }
                    }
                }
            }
        }

        // Phase 2: release escrow for completed orders. Orders completed in
        // phase 1 join behind those already completed on the snapshot.
        if finalize_enabled {
            let limit = options.finalize_limit.unwrap_or(self.config.finalize_limit);
            let mut candidates: Vec<String> = pick_finalizable(&orders, limit)
                .into_iter()
                .map(|order| order.order_id.clone())
                .collect();
            for id in just_completed {
                if candidates.len() >= limit {
                    break;
                }
                candidates.push(id);
            }
            outcome.finalize_candidates = candidates.len();

            if !options.dry_run {
                for order_id in &candidates {
                    match self.client.finalize_order_admin(order_id).await {
                        Ok(receipt) => {
                            outcome.finalized += 1;
                            info!("auto-finalize: order {} finalized ({})", order_id, receipt.digest);
                            if let Err(e) = self.sync.sync_chain_order(order_id).await {
                                warn!("auto-finalize: resync of order {} failed: {:?}", order_id, e);
                            }
                        }
                        Err(e) => {
                            error!("auto-finalize: finalize {} failed: {:?}", order_id, e);
                        }
                    }
                }
            }
        }

        self.record(actor, &options, &outcome).await;
        Ok(outcome)
    }

    async fn record(
        &self,
        actor: &str,
        options: &AutoFinalizeOptions,
        outcome: &AutoFinalizeOutcome,
    ) {
        let detail = serde_json::json!({
            "dry_run": options.dry_run,
            "hours": outcome.hours,
            "complete_enabled": outcome.complete_enabled,
            "finalize_enabled": outcome.finalize_enabled,
            "complete_candidates": outcome.complete_candidates,
            "completed": outcome.completed,
            "finalize_candidates": outcome.finalize_candidates,
            "finalized": outcome.finalized,
        });
        if let Err(e) = self.audit.record(actor, "sweep.auto_finalize", detail).await {
            warn!("auto-finalize: audit record failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(order_id: &str, status: OrderStatus, created_at: &str) -> ChainOrder {
        ChainOrder {
            order_id: order_id.to_string(),
            status,
            created_at: created_at.to_string(),
            buyer: "0xb".to_string(),
            companion: "0xc".to_string(),
            price: 1_000,
            deposit: 100,
        }
    }

    #[test]
    fn test_completable_requires_deposited() {
        let now = 1_000_000;
        for status in [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::Completed,
            OrderStatus::Disputed,
            OrderStatus::Resolved,
            OrderStatus::Cancelled,
        ] {
            assert!(!is_auto_completable(&order("1", status, "0"), now, 100));
        }
        assert!(is_auto_completable(
            &order("1", OrderStatus::Deposited, "0"),
            now,
            100
        ));
    }

    #[test]
    fn test_completable_window_is_strict() {
        let now = 1_000_000;
        let window = 1_000;
        let boundary = order("1", OrderStatus::Deposited, &(now - window).to_string());
        assert!(!is_auto_completable(&boundary, now, window));
        let older = order("1", OrderStatus::Deposited, &(now - window - 1).to_string());
        assert!(is_auto_completable(&older, now, window));
    }

    #[test]
    fn test_pick_auto_completable_limit_and_order() {
        let orders: Vec<ChainOrder> = (0..3)
            .map(|i| order(&i.to_string(), OrderStatus::Deposited, "0"))
            .collect();
        let picked = pick_auto_completable(&orders, 1_000_000, 1_000, 2);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].order_id, "0");
        assert_eq!(picked[1].order_id, "1");
    }

    #[test]
    fn test_pick_finalizable_filters_completed() {
        let orders = vec![
            order("1", OrderStatus::Completed, "0"),
            order("2", OrderStatus::Deposited, "0"),
            order("3", OrderStatus::Completed, "0"),
        ];
        let picked = pick_finalizable(&orders, 10);
        let ids: Vec<&str> = picked.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        assert_eq!(pick_finalizable(&orders, 1).len(), 1);
    }
}
