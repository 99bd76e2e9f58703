use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use fansite_shared::errors::{AppError, AppResult};
use fansite_shared::types::api::ApiResponse;

use crate::models::{Message, MessagePayload, Side};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 { 50 }

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub id: i64,
    pub side: Side,
}

// --- Handlers ---

/// POST /chat/:side/messages - send from the visitor or operator side
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(side): Path<Side>,
    body: Result<Json<MessagePayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse<SentMessage>>> {
    let Json(req) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let id = state.hub.send_message(side, &req).await?;

    tracing::info!(side = %side, id, sender = %req.sender.trim(), "chat message sent");

    Ok(Json(ApiResponse::ok(SentMessage { id, side })))
}

/// GET /chat/:side/messages - recent messages from one store only
pub async fn recent_messages(
    State(state): State<Arc<AppState>>,
    Path(side): Path<Side>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<ApiResponse<Vec<Message>>>> {
    let items = state.hub.recent_messages(side, params.limit).await?;
    Ok(Json(ApiResponse::ok(items)))
}

/// GET /chat/messages - recent messages merged across both stores
pub async fn merged_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<ApiResponse<Vec<Message>>>> {
    let items = state.hub.merged_recent(params.limit).await?;
    Ok(Json(ApiResponse::ok(items)))
}

/// GET /chat/conversations/:peer - one peer's conversation with the operator
pub async fn conversation(
    State(state): State<Arc<AppState>>,
    Path(peer): Path<String>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<ApiResponse<Vec<Message>>>> {
    let items = state.hub.merged_conversation(&peer, params.limit).await?;
    Ok(Json(ApiResponse::ok(items)))
}
