pub mod error;
pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chain::ChainService;
use crate::storage::Storage;
use crate::sync::SyncQueue;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub chain: Arc<dyn ChainService>,
    pub sync: SyncQueue,
}

pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/dashboard/stats", get(handlers::dashboard_stats))
        .route(
            "/api/wallets",
            get(handlers::list_wallets).post(handlers::create_wallet),
        )
        .route(
            "/api/wallets/{id}",
            get(handlers::get_wallet)
                .put(handlers::update_wallet)
                .delete(handlers::delete_wallet),
        )
        .route("/api/wallets/{id}/sync", post(handlers::sync_wallet))
        .route("/api/rewards/history", get(handlers::reward_history))
        .route(
            "/api/rewards/chart/{wallet_id}",
            get(handlers::reward_chart),
        )
        .route("/api/rewards/export", get(handlers::export_rewards))
        .route("/api/network/status", get(handlers::network_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
