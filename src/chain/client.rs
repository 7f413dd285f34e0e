use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::chain::types::{ChainOrder, ResolveDisputeRequest, TxReceipt};
use crate::config::GatewayConfig;
use crate::error::{AppResult, ChainError};

/// Boundary to the on-chain escrow package. The chain is the source of truth
/// for order state; everything here is reads plus admin-sponsored mutations.
#[async_trait]
pub trait ChainOrderClient: Send + Sync {
    /// Fetch a single order; `force_refresh` bypasses the read cache.
    /// Returns None when the order does not exist on chain.
    async fn find_order(&self, order_id: &str, force_refresh: bool)
        -> AppResult<Option<ChainOrder>>;

    /// Fetch every order under the escrow package, oldest first.
    async fn fetch_orders_admin(&self) -> AppResult<Vec<ChainOrder>>;

    async fn cancel_order_admin(&self, order_id: &str) -> AppResult<TxReceipt>;

    async fn complete_order_admin(&self, order_id: &str) -> AppResult<TxReceipt>;

    /// Release escrowed funds of a completed order to the companion.
    async fn finalize_order_admin(&self, order_id: &str) -> AppResult<TxReceipt>;

    async fn resolve_dispute_admin(&self, request: &ResolveDisputeRequest) -> AppResult<TxReceipt>;

    /// Credit diamonds to a user's on-chain balance. Irreversible; callers
    /// are responsible for idempotency.
    async fn credit_balance_admin(&self, user_address: &str, amount: u64) -> AppResult<TxReceipt>;
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

struct CachedOrder {
    order: ChainOrder,
    fetched_at: Instant,
}

/// JSON-RPC client for the Sui escrow gateway, with a TTL read cache.
///
/// Mutating calls are sponsored by the gateway's admin key; the backend only
/// holds a bearer token. The read cache exists because admin views hammer the
/// same handful of orders; any path about to mutate must pass
/// `force_refresh = true` so it never acts on a stale status.
pub struct SuiGatewayClient {
    http: Client,
    config: GatewayConfig,
    cache: RwLock<HashMap<String, CachedOrder>>,
}

impl SuiGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.config.cache_ttl_ms)
    }

    fn cached(&self, order_id: &str) -> Option<ChainOrder> {
        let cache = self.cache.read();
        cache.get(order_id).and_then(|entry| {
            if entry.fetched_at.elapsed() < self.cache_ttl() {
                Some(entry.order.clone())
            } else {
                None
            }
        })
    }

    fn store(&self, order: &ChainOrder) {
        let mut cache = self.cache.write();
        cache.insert(
            order.order_id.clone(),
            CachedOrder {
                order: order.clone(),
                fetched_at: Instant::now(),
            },
        );
    }

    fn evict(&self, order_id: &str) {
        self.cache.write().remove(order_id);
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<T>, ChainError> {
        let mut request = self
            .http
            .post(&self.config.url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id: 1,
                method,
                params,
            });
        if let Some(token) = &self.config.admin_token {
            request = request.bearer_auth(token);
        }

        let response: RpcResponse<T> = request.send().await?.json().await?;
        if let Some(error) = response.error {
            return Err(ChainError::Gateway {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }

    async fn execute(&self, method: &str, order_id: &str) -> AppResult<TxReceipt> {
        let receipt: TxReceipt = self
            .call(
                method,
                serde_json::json!({
                    "package": self.config.package_id,
                    "order_id": order_id,
                }),
            )
            .await?
            .ok_or_else(|| ChainError::Malformed(format!("{} returned no receipt", method)))?;
        // A mutation invalidates whatever we cached for this order
        self.evict(order_id);
        debug!("{} executed for order {}: {}", method, order_id, receipt.digest);
        Ok(receipt)
    }
}

#[async_trait]
impl ChainOrderClient for SuiGatewayClient {
    async fn find_order(
        &self,
        order_id: &str,
        force_refresh: bool,
    ) -> AppResult<Option<ChainOrder>> {
        if !force_refresh {
            if let Some(order) = self.cached(order_id) {
                return Ok(Some(order));
            }
        }

        let found: Option<ChainOrder> = self
            .call(
                "escrow_getOrder",
                serde_json::json!({
                    "package": self.config.package_id,
                    "order_id": order_id,
                }),
            )
            .await?;

        match &found {
            Some(order) => self.store(order),
            None => self.evict(order_id),
        }
        Ok(found)
    }

    async fn fetch_orders_admin(&self) -> AppResult<Vec<ChainOrder>> {
        let orders: Vec<ChainOrder> = self
            .call(
                "escrow_listOrders",
                serde_json::json!({ "package": self.config.package_id }),
            )
            .await?
            .unwrap_or_default();
        for order in &orders {
            self.store(order);
        }
        Ok(orders)
    }

    async fn cancel_order_admin(&self, order_id: &str) -> AppResult<TxReceipt> {
        self.execute("escrow_cancelOrder", order_id).await
    }

    async fn complete_order_admin(&self, order_id: &str) -> AppResult<TxReceipt> {
        self.execute("escrow_completeOrder", order_id).await
    }

    async fn finalize_order_admin(&self, order_id: &str) -> AppResult<TxReceipt> {
        self.execute("escrow_finalizeOrder", order_id).await
    }

    async fn resolve_dispute_admin(&self, request: &ResolveDisputeRequest) -> AppResult<TxReceipt> {
        let receipt: TxReceipt = self
            .call(
                "escrow_resolveDispute",
                serde_json::json!({
                    "package": self.config.package_id,
                    "order_id": request.order_id,
                    "service_refund_bps": request.service_refund_bps,
                    "deposit_slash_bps": request.deposit_slash_bps,
                }),
            )
            .await?
            .ok_or_else(|| ChainError::Malformed("resolveDispute returned no receipt".into()))?;
        self.evict(&request.order_id);
        Ok(receipt)
    }

    async fn credit_balance_admin(&self, user_address: &str, amount: u64) -> AppResult<TxReceipt> {
        if amount == 0 {
            warn!("refusing zero-amount credit for {}", user_address);
            return Err(crate::error::AppError::InvalidInput(
                "credit amount must be positive".to_string(),
            ));
        }
        let receipt: TxReceipt = self
            .call(
                "escrow_creditBalance",
                serde_json::json!({
                    "package": self.config.package_id,
                    "recipient": user_address,
                    "amount": amount.to_string(),
                }),
            )
            .await?
            .ok_or_else(|| ChainError::Malformed("creditBalance returned no receipt".into()))?;
        Ok(receipt)
    }
}
