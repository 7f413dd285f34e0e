use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handlers::{
    cancel_order, cleanup_missing, create_order, credit_ledger, cron_auto_cancel,
    cron_auto_finalize, cron_sync, get_order, health_check, list_audit, list_orders,
    payment_webhook, resolve_order, sync_orders, AppState,
};
use crate::middleware::{cron_auth::cron_auth, rate_limit::rate_limit};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let admin_routes = Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/sync", post(sync_orders))
        .route("/orders/cleanup-missing", post(cleanup_missing))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/resolve", post(resolve_order))
        .route("/ledger/credit", post(credit_ledger))
        .route("/audit", get(list_audit))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    // Authorization runs before any lock acquisition or chain work
    let cron_routes = Router::new()
        .route("/auto-cancel", post(cron_auto_cancel))
        .route("/auto-finalize", post(cron_auto_finalize))
        .route("/sync", post(cron_sync))
        .layer(from_fn_with_state(state.clone(), cron_auth));

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                .nest("/admin", admin_routes)
                .nest("/cron", cron_routes)
                .route("/webhook/payment", post(payment_webhook)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::very_permissive()),
        )
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
