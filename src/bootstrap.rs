use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::api::handlers::AppState;
use crate::audit::AuditRepository;
use crate::cache::ResponseCache;
use crate::chain::client::{ChainOrderClient, SuiGatewayClient};
use crate::config::Config;
use crate::cron::CronLockStore;
use crate::error::AppResult;
use crate::ledger::{LedgerRepository, LedgerService};
use crate::middleware::rate_limit::build_rate_limiter;
use crate::orders::{ChainSyncService, OrderRepository};
use crate::sweeps::{AutoCancelSweep, AutoFinalizeSweep, SweepScheduler};

pub async fn initialize_app_state(config: Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let pool = initialize_database(&config.database_url).await?;
    let config = Arc::new(config);

    let chain: Arc<dyn ChainOrderClient> =
        Arc::new(SuiGatewayClient::new(config.gateway.clone()));
    info!("✅ Escrow gateway client initialized ({})", config.gateway.url);

    let orders = Arc::new(OrderRepository::new(pool.clone()));
    let audit = Arc::new(AuditRepository::new(pool.clone()));
    let receipts = Arc::new(LedgerRepository::new(pool.clone()));
    let locks = Arc::new(CronLockStore::new(pool.clone()));

    let sync = Arc::new(ChainSyncService::new(chain.clone(), orders.clone()));
    let auto_cancel = Arc::new(AutoCancelSweep::new(
        chain.clone(),
        sync.clone(),
        audit.clone(),
        config.sweeps.clone(),
    ));
    let auto_finalize = Arc::new(AutoFinalizeSweep::new(
        chain.clone(),
        sync.clone(),
        audit.clone(),
        config.sweeps.clone(),
    ));
    let ledger = Arc::new(LedgerService::new(chain.clone(), receipts));
    info!(
        "✅ Sweeps configured (auto-cancel: {}, auto-complete: {}, auto-finalize: {})",
        config.sweeps.auto_cancel_enabled,
        config.sweeps.auto_complete_enabled,
        config.sweeps.auto_finalize_enabled
    );

    let response_cache = Arc::new(ResponseCache::new(config.response_cache_ttl_ms));
    let rate_limiter = build_rate_limiter(100, 60);

    let state = AppState {
        config: config.clone(),
        chain,
        orders,
        sync: sync.clone(),
        auto_cancel: auto_cancel.clone(),
        auto_finalize: auto_finalize.clone(),
        ledger,
        audit,
        locks: locks.clone(),
        response_cache,
        rate_limiter,
    };

    // Background sweep loop; cron locks keep it from racing HTTP-triggered
    // runs or other replicas
    let scheduler = Arc::new(SweepScheduler::new(
        sync,
        auto_cancel,
        auto_finalize,
        locks,
        config.sweeps.clone(),
    ));
    scheduler.start();
    info!("✅ Sweep scheduler task started (every {}s)", config.sweeps.interval_secs);

    Ok(state)
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
