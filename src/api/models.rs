use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::chain::status::OrderStatus;
use crate::chain::types::ChainOrder;
use crate::ledger::models::{parse_diamond_amount, CreditOutcome};
use crate::orders::models::LocalOrder;
use crate::orders::sync::SyncSummary;

// ---------- queries ----------

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub source: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderDetailQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditListQuery {
    pub action: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

// ---------- request bodies ----------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub buyer_address: Option<String>,
    pub companion_id: Option<String>,
    #[validate(range(min = 0, message = "price cannot be negative"))]
    pub price: i64,
    #[validate(range(min = 0, message = "deposit cannot be negative"))]
    pub deposit: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveBody {
    #[validate(range(max = 10_000, message = "must be between 0 and 10000 bps"))]
    pub service_refund_bps: u32,
    #[validate(range(max = 10_000, message = "must be between 0 and 10000 bps"))]
    pub deposit_slash_bps: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    /// 0 disables the age filter (manual full cleanup)
    #[serde(default)]
    pub max_age_hours: u32,
    pub max_delete: Option<usize>,
    /// Only honored for dry-run previews; destructive runs always restrict
    /// to chain-sourced rows
    pub chain_only: Option<bool>,
    #[serde(default)]
    pub dry_run: bool,
}

fn validate_amount_string(value: &str) -> Result<(), ValidationError> {
    parse_diamond_amount(value).map(|_| ()).map_err(|_| {
        let mut error = ValidationError::new("amount");
        error.message = Some("must be a positive integer string".into());
        error
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreditLedgerRequest {
    #[validate(length(min = 1, message = "user_address is required"))]
    pub user_address: String,
    #[validate(custom = "validate_amount_string")]
    pub amount: String,
    #[validate(length(min = 1, message = "receipt_id is required"))]
    pub receipt_id: String,
    pub order_id: Option<String>,
    pub memo: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentWebhookRequest {
    /// Gateway payment reference; doubles as the credit receipt id
    #[validate(length(min = 1, message = "reference is required"))]
    pub reference: String,
    #[validate(length(min = 1, message = "user_address is required"))]
    pub user_address: String,
    #[validate(custom = "validate_amount_string")]
    pub amount: String,
    pub order_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepTriggerRequest {
    #[serde(default)]
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub complete_limit: Option<usize>,
    pub finalize_limit: Option<usize>,
}

// ---------- responses ----------

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub order: Option<LocalOrder>,
    pub chain: Option<ChainOrder>,
    pub effective_status: Option<OrderStatus>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub digest: String,
    pub order: Option<ChainOrder>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub summary: SyncSummary,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub ok: bool,
    pub dry_run: bool,
    pub chain_only: bool,
    pub missing: usize,
    pub eligible: usize,
    pub deleted: u64,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub outcome: CreditOutcome,
}
