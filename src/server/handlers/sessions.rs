use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::llm::ChatMessage;
use crate::state::AppState;

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let sessions = state.sessions.list().await?;
    Ok(Json(json!({"sessions": sessions})))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let session_id = state.sessions.create()?;
    Ok((StatusCode::CREATED, Json(json!({"session_id": session_id}))))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let handle = state.sessions.get(&session_id)?;
    let session = handle.lock().await;
    let secret = &state.settings.deletion_secret;
    let messages: Vec<ChatMessage> = session
        .history
        .iter()
        .map(|message| ChatMessage {
            role: message.role.clone(),
            content: secret.redact(&message.content),
        })
        .collect();
    Ok(Json(json!({
        "id": session.id,
        "created_at": session.created_at,
        "state": session.state.snapshot(),
        "messages": messages,
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    if !state.sessions.remove(&session_id)? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(Json(json!({"success": true})))
}
