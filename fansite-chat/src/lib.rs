use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod consolidator;
pub mod directory;
pub mod hub;
pub mod models;
pub mod replication;
pub mod routes;
pub mod store;

#[cfg(test)]
mod testing;

pub struct AppState {
    pub hub: hub::ChatHub,
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        // Per-side messages
        .route(
            "/chat/:side/messages",
            get(routes::messages::recent_messages).post(routes::messages::send_message),
        )
        // Merged views
        .route("/chat/messages", get(routes::messages::merged_recent))
        .route("/chat/conversations/:peer", get(routes::messages::conversation))
        .route("/chat/participants", get(routes::participants::list_participants))
        .layer(axum::middleware::from_fn(fansite_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
