use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audit::AuditRepository;
use crate::chain::client::ChainOrderClient;
use crate::chain::status::pick_auto_cancelable;
use crate::config::SweepConfig;
use crate::error::AppResult;
use crate::orders::sync::ChainSyncService;

const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCancelOptions {
    pub dry_run: bool,
    /// Overrides the configured per-run cap
    pub limit: Option<usize>,
}

/// Every numeric field is present even for disabled or empty runs, so
/// callers can tell "disabled" from "ran and found nothing".
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AutoCancelOutcome {
    pub ok: bool,
    pub enabled: bool,
    pub hours: u32,
    pub candidates: usize,
    pub canceled: usize,
}

/// Cancels stale orders that never reached deposit, on chain and in the
/// local mirror. Candidates are processed sequentially, best-effort: one
/// failed cancellation is logged and skipped, the rest of the run continues,
/// and the next cycle retries whatever is still eligible.
pub struct AutoCancelSweep {
    client: Arc<dyn ChainOrderClient>,
    sync: Arc<ChainSyncService>,
    audit: Arc<AuditRepository>,
    config: SweepConfig,
}

impl AutoCancelSweep {
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

    pub async fn run(&self, actor: &str, options: AutoCancelOptions) -> AppResult<AutoCancelOutcome> {
        let hours = self.config.auto_cancel_hours;

        if !self.config.auto_cancel_enabled {
            let outcome = AutoCancelOutcome {
                ok: true,
                enabled: false,
                hours,
                candidates: 0,
                canceled: 0,
            };
            self.record(actor, &options, &outcome).await;
            return Ok(outcome);
        }

        let limit = options.limit.unwrap_or(self.config.auto_cancel_limit);
        let threshold_ms = i64::from(hours) * HOUR_MS;
        let now_ms = Utc::now().timestamp_millis();

        // Losing the chain entirely is fatal to this invocation
        let orders = self.client.fetch_orders_admin().await?;
        let candidates = pick_auto_cancelable(&orders, now_ms, threshold_ms, limit);

        let mut canceled = 0;
        if !options.dry_run {
            for order in &candidates {
                match self.client.cancel_order_admin(&order.order_id).await {
                    Ok(receipt) => {
                        canceled += 1;
                        info!(
                            "auto-cancel: order {} canceled ({})",
                            order.order_id, receipt.digest
                        );
                        if let Err(e) = self.sync.sync_chain_order(&order.order_id).await {
                            warn!(
                                "auto-cancel: resync of order {} failed: {:?}",
                                order.order_id, e
                            );
                        }
                    }
                    Err(e) => {
                        // skipped, retried by the next cycle
                        error!("auto-cancel: order {} failed: {:?}", order.order_id, e);
                    }
                }
            }
        }

        let outcome = AutoCancelOutcome {
            ok: true,
            enabled: true,
            hours,
            candidates: candidates.len(),
            canceled,
        };
        self.record(actor, &options, &outcome).await;
        Ok(outcome)
    }

    async fn record(&self, actor: &str, options: &AutoCancelOptions, outcome: &AutoCancelOutcome) {
        let detail = serde_json::json!({
            "dry_run": options.dry_run,
            "limit": options.limit,
            "enabled": outcome.enabled,
            "hours": outcome.hours,
            "candidates": outcome.candidates,
            "canceled": outcome.canceled,
        });
        if let Err(e) = self.audit.record(actor, "sweep.auto_cancel", detail).await {
            warn!("auto-cancel: audit record failed: {:?}", e);
        }
    }
}
