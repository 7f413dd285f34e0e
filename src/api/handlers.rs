use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::models::*;
use crate::audit::AuditRepository;
use crate::cache::ResponseCache;
use crate::chain::client::ChainOrderClient;
use crate::chain::status::{effective_status, is_cancelable, OrderStatus};
use crate::chain::types::ResolveDisputeRequest;
use crate::config::Config;
use crate::cron::{CronLockStore, LOCK_AUTO_CANCEL, LOCK_AUTO_FINALIZE, LOCK_CHAIN_SYNC};
use crate::error::{AppError, AppResult};
use crate::ledger::service::{CreditRequest, LedgerService};
use crate::orders::missing::compute_missing_chain_cleanup;
use crate::orders::models::OrderSource;
use crate::orders::repository::{OrderListFilter, OrderRepository};
use crate::orders::sync::ChainSyncService;
use crate::pagination::{decode_cursor_param, Cursor, Page};
use crate::sweeps::auto_cancel::{AutoCancelOptions, AutoCancelOutcome, AutoCancelSweep};
use crate::sweeps::auto_finalize::{AutoFinalizeOptions, AutoFinalizeOutcome, AutoFinalizeSweep};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chain: Arc<dyn ChainOrderClient>,
    pub orders: Arc<OrderRepository>,
    pub sync: Arc<ChainSyncService>,
    pub auto_cancel: Arc<AutoCancelSweep>,
    pub auto_finalize: Arc<AutoFinalizeSweep>,
    pub ledger: Arc<LedgerService>,
    pub audit: Arc<AuditRepository>,
    pub locks: Arc<CronLockStore>,
    pub response_cache: Arc<ResponseCache>,
    pub rate_limiter: Arc<crate::middleware::rate_limit::AdminRateLimiter>,
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "companion-backend" }))
}

fn page_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn order_cache_key(order_id: &str) -> String {
    format!("order:{}", order_id)
}

// ---------- admin: orders ----------

/// GET /admin/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Page<crate::orders::models::LocalOrder>>> {
    let source = match query.source.as_deref() {
        None => None,
        Some("chain") => Some(OrderSource::Chain),
        Some("app") => Some(OrderSource::App),
        Some("seed") => Some(OrderSource::Seed),
        Some(other) => {
            return Err(AppError::InvalidInput(format!(
                "unknown source '{}', expected chain|app|seed",
                other
            )))
        }
    };
    if let Some(status) = query.status {
        if OrderStatus::from_i16(status).is_none() {
            return Err(AppError::InvalidInput(format!(
                "unknown status {}, expected 0..=6",
                status
            )));
        }
    }

    let filter = OrderListFilter {
        source,
        status: query.status,
    };
    let cursor = decode_cursor_param(query.cursor.as_deref());
    let limit = page_limit(query.limit);

    let rows = state.orders.list(&filter, cursor.as_ref(), limit + 1).await?;
    Ok(Json(Page::from_rows(rows, limit as usize, |order| Cursor {
        created_at: order.created_at_ms(),
        id: order.id.clone(),
    })))
}

/// POST /admin/orders — record an app-placed booking
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> AppResult<Json<crate::orders::models::LocalOrder>> {
    request.validate()?;
    let order = state
        .orders
        .create_app_order(
            request.buyer_address.as_deref(),
            request.companion_id.as_deref(),
            request.price,
            request.deposit,
        )
        .await?;
    state
        .audit
        .record(
            "admin",
            "order.create",
            serde_json::json!({ "order_id": order.id.clone(), "price": order.price }),
        )
        .await?;
    Ok(Json(order))
}

/// GET /admin/orders/:id
///
/// `refresh=true` bypasses both the response cache and the RPC-layer cache;
/// without it, repeated admin-panel polls are served from the response cache.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<OrderDetailQuery>,
) -> AppResult<Response> {
    let cache_key = order_cache_key(&order_id);
    if !query.refresh {
        if let Some(cached) = state.response_cache.get(&cache_key).await {
            return Ok(([(http::header::ETAG, cached.etag)], Json(cached.value)).into_response());
        }
    }

    let chain = state.sync.find_chain_order(&order_id, query.refresh).await?;
    let local = state.orders.get(&order_id).await?;
    if chain.is_none() && local.is_none() {
        return Err(AppError::OrderNotFound(order_id));
    }

    let effective = effective_status(
        local.as_ref().and_then(|o| o.effective_status()),
        chain.as_ref().map(|o| o.status),
    );
    let body = serde_json::to_value(OrderDetailResponse {
        order: local,
        chain,
        effective_status: effective,
    })
    .map_err(|e| AppError::Internal(format!("serialize order detail: {}", e)))?;

    let entry = state.response_cache.set(&cache_key, body).await;
    Ok(([(http::header::ETAG, entry.etag)], Json(entry.value)).into_response())
}

/// POST /admin/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<ActionResponse>> {
    // Never decide on a cached status: refresh, then gate, then act.
    let Some(order) = state.sync.find_chain_order(&order_id, true).await? else {
        return Err(AppError::OrderNotFound(order_id));
    };
    if !is_cancelable(order.status) {
        return Err(AppError::IllegalTransition {
            order_id,
            action: "cancel",
            current: order.status,
            allowed: vec![OrderStatus::Created, OrderStatus::Paid],
        });
    }

    let receipt = state.chain.cancel_order_admin(&order_id).await?;
    let synced = state.sync.sync_chain_order(&order_id).await?;
    state.response_cache.invalidate(&order_cache_key(&order_id)).await;

    state
        .audit
        .record(
            "admin",
            "order.cancel",
            serde_json::json!({
                "order_id": order_id.clone(),
                "prior_status": order.status,
                "digest": receipt.digest.clone(),
            }),
        )
        .await?;
    info!("admin canceled order {} ({})", order_id, receipt.digest);

    Ok(Json(ActionResponse {
        ok: true,
        digest: receipt.digest,
        order: synced,
    }))
}

/// POST /admin/orders/:id/resolve
pub async fn resolve_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<ResolveBody>,
) -> AppResult<Json<ActionResponse>> {
    body.validate()?;

    let Some(order) = state.sync.find_chain_order(&order_id, true).await? else {
        return Err(AppError::OrderNotFound(order_id));
    };
    if order.status != OrderStatus::Disputed {
        return Err(AppError::IllegalTransition {
            order_id,
            action: "resolve",
            current: order.status,
            allowed: vec![OrderStatus::Disputed],
        });
    }

    let request = ResolveDisputeRequest {
        order_id: order_id.clone(),
        service_refund_bps: body.service_refund_bps,
        deposit_slash_bps: body.deposit_slash_bps,
    };
    let receipt = state.chain.resolve_dispute_admin(&request).await?;
    let synced = state.sync.sync_chain_order(&order_id).await?;
    state.response_cache.invalidate(&order_cache_key(&order_id)).await;

    // split preview in whole diamonds, for the trail
    let service_refund = (Decimal::from(order.price)
        * Decimal::from(body.service_refund_bps)
        / dec!(10_000))
    .trunc();
    let deposit_slash = (Decimal::from(order.deposit)
        * Decimal::from(body.deposit_slash_bps)
        / dec!(10_000))
    .trunc();
    state
        .audit
        .record(
            "admin",
            "order.resolve",
            serde_json::json!({
                "order_id": order_id.clone(),
                "service_refund_bps": body.service_refund_bps,
                "deposit_slash_bps": body.deposit_slash_bps,
                "service_refund": service_refund,
                "deposit_slash": deposit_slash,
                "digest": receipt.digest.clone(),
            }),
        )
        .await?;
    info!("admin resolved dispute for order {} ({})", order_id, receipt.digest);

    Ok(Json(ActionResponse {
        ok: true,
        digest: receipt.digest,
        order: synced,
    }))
}

/// POST /admin/orders/sync
pub async fn sync_orders(State(state): State<AppState>) -> AppResult<Json<SyncResponse>> {
    let summary = state.sync.sync_chain_orders().await?;
    Ok(Json(SyncResponse { ok: true, summary }))
}

/// POST /admin/orders/cleanup-missing
///
/// Preview (`dry_run`) and destructive sweep share the same deterministic
/// computation; only the destructive path deletes, and it always restricts
/// to chain-sourced rows regardless of what the caller asked for.
pub async fn cleanup_missing(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> AppResult<Json<CleanupResponse>> {
    let chain_only = if request.dry_run {
        request.chain_only.unwrap_or(true)
    } else {
        true
    };

    let chain_orders = state.chain.fetch_orders_admin().await?;
    let snapshots = state.orders.snapshots().await?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    let cleanup = compute_missing_chain_cleanup(
        &chain_orders,
        &snapshots,
        request.max_age_hours,
        request.max_delete,
        now_ms,
        chain_only,
    );

    let deleted = if request.dry_run {
        0
    } else {
        let deleted = state.orders.delete_orders(&cleanup.ids, true).await?;
        state
            .audit
            .record(
                "admin",
                "orders.cleanup_missing",
                serde_json::json!({
                    "max_age_hours": request.max_age_hours,
                    "max_delete": request.max_delete,
                    "missing": cleanup.missing.len(),
                    "eligible": cleanup.eligible.len(),
                    "deleted": deleted,
                }),
            )
            .await?;
        deleted
    };

    Ok(Json(CleanupResponse {
        ok: true,
        dry_run: request.dry_run,
        chain_only,
        missing: cleanup.missing.len(),
        eligible: cleanup.eligible.len(),
        deleted,
        ids: cleanup.ids,
    }))
}

// ---------- admin: ledger + audit ----------

/// POST /admin/ledger/credit
pub async fn credit_ledger(
    State(state): State<AppState>,
    Json(request): Json<CreditLedgerRequest>,
) -> AppResult<Json<CreditResponse>> {
    request.validate()?;
    let outcome = state
        .ledger
        .credit_with_admin(CreditRequest {
            user_address: request.user_address.clone(),
            amount: request.amount.clone(),
            receipt_id: request.receipt_id.clone(),
            order_id: request.order_id.clone(),
            memo: request.memo,
        })
        .await?;
    state
        .audit
        .record(
            "admin",
            "ledger.credit",
            serde_json::json!({
                "receipt_id": request.receipt_id,
                "order_id": request.order_id,
                "user_address": request.user_address,
                "amount": request.amount,
                "duplicated": outcome.duplicated,
                "digest": outcome.digest.clone(),
            }),
        )
        .await?;
    Ok(Json(CreditResponse { ok: true, outcome }))
}

/// GET /admin/audit
pub async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditListQuery>,
) -> AppResult<Json<Page<crate::audit::models::AuditLog>>> {
    let cursor = decode_cursor_param(query.cursor.as_deref());
    let limit = page_limit(query.limit);
    let rows = state
        .audit
        .list(query.action.as_deref(), cursor.as_ref(), limit + 1)
        .await?;
    Ok(Json(Page::from_rows(rows, limit as usize, |entry| Cursor {
        created_at: entry.created_at.timestamp_millis(),
        id: entry.id.to_string(),
    })))
}

// ---------- webhooks ----------

/// POST /webhook/payment — the gateway's payment reference doubles as the
/// credit receipt id, so redelivered webhooks are no-ops.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(request): Json<PaymentWebhookRequest>,
) -> AppResult<Json<CreditResponse>> {
    request.validate()?;
    let outcome = state
        .ledger
        .credit_with_admin(CreditRequest {
            user_address: request.user_address.clone(),
            amount: request.amount.clone(),
            receipt_id: request.reference.clone(),
            order_id: request.order_id.clone(),
            memo: Some("payment-gateway".to_string()),
        })
        .await?;
    state
        .audit
        .record(
            "webhook",
            "ledger.credit",
            serde_json::json!({
                "receipt_id": request.reference,
                "order_id": request.order_id,
                "user_address": request.user_address,
                "amount": request.amount,
                "duplicated": outcome.duplicated,
                "digest": outcome.digest.clone(),
            }),
        )
        .await?;
    Ok(Json(CreditResponse { ok: true, outcome }))
}

// ---------- cron ----------

/// POST /cron/auto-cancel
pub async fn cron_auto_cancel(
    State(state): State<AppState>,
    body: Option<Json<SweepTriggerRequest>>,
) -> AppResult<Json<AutoCancelOutcome>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let ttl = state.config.sweeps.lock_ttl_ms;
    if !state.locks.acquire(LOCK_AUTO_CANCEL, ttl).await? {
        return Err(AppError::SweepLocked(LOCK_AUTO_CANCEL.to_string()));
    }
    let result = state
        .auto_cancel
        .run(
            "cron",
            AutoCancelOptions {
                dry_run: request.dry_run,
                limit: request.limit,
            },
        )
        .await;
    state.locks.release(LOCK_AUTO_CANCEL).await;
    Ok(Json(result?))
}

/// POST /cron/auto-finalize
pub async fn cron_auto_finalize(
    State(state): State<AppState>,
    body: Option<Json<SweepTriggerRequest>>,
) -> AppResult<Json<AutoFinalizeOutcome>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let ttl = state.config.sweeps.lock_ttl_ms;
    if !state.locks.acquire(LOCK_AUTO_FINALIZE, ttl).await? {
        return Err(AppError::SweepLocked(LOCK_AUTO_FINALIZE.to_string()));
    }
    let result = state
        .auto_finalize
        .run(
            "cron",
            AutoFinalizeOptions {
                dry_run: request.dry_run,
                complete_limit: request.complete_limit,
                finalize_limit: request.finalize_limit,
            },
        )
        .await;
    state.locks.release(LOCK_AUTO_FINALIZE).await;
    Ok(Json(result?))
}

/// POST /cron/sync
pub async fn cron_sync(State(state): State<AppState>) -> AppResult<Json<SyncResponse>> {
    let ttl = state.config.sweeps.lock_ttl_ms;
    if !state.locks.acquire(LOCK_CHAIN_SYNC, ttl).await? {
        return Err(AppError::SweepLocked(LOCK_CHAIN_SYNC.to_string()));
    }
    let result = state.sync.sync_chain_orders().await;
    state.locks.release(LOCK_CHAIN_SYNC).await;
    Ok(Json(SyncResponse {
        ok: true,
        summary: result?,
    }))
}
