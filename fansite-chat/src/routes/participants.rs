use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use fansite_shared::errors::AppResult;
use fansite_shared::types::api::ApiResponse;

use crate::models::Participant;
use crate::AppState;

/// GET /chat/participants - everyone who has chatted, most recently active first
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Participant>>>> {
    let participants = state.hub.participants().await?;
    Ok(Json(ApiResponse::ok(participants)))
}
