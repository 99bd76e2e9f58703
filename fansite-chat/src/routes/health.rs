use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fansite_shared::{HealthCheck, HealthResponse};
use std::sync::Arc;

use crate::models::Side;
use crate::AppState;

/// Health check that pings both message stores.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let mut checks = Vec::with_capacity(Side::ALL.len());

    for side in Side::ALL {
        let check = match state.hub.store(side).ping().await {
            Ok(()) => HealthCheck::healthy(side.store_name()),
            Err(e) => HealthCheck::unhealthy(side.store_name(), e.to_string()),
        };
        checks.push(check);
    }

    let response = HealthResponse::healthy("fansite-chat", env!("CARGO_PKG_VERSION"))
        .with_checks(checks);

    (response.http_status(), Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
