use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub message: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(payload): Json<ChatPayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    if state.chat_limiter.check().is_err() {
        tracing::warn!("Chat turn for session {} rate limited", session_id);
        return Err(ApiError::RateLimited);
    }

    let handle = state.sessions.get(&session_id)?;
    let mut session = handle.lock().await;
    let mut outcome = state.agent.run_turn(&mut session, &payload.message).await?;
    outcome.reply = state.settings.deletion_secret.redact(&outcome.reply);
    Ok(Json(outcome))
}
