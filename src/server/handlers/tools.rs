use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;
use crate::tools::{execute_tool, tool_definitions};

pub async fn list_tools(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    Ok(Json(json!({"tools": tool_definitions()})))
}

/// Runs one tool against a session, bypassing the LLM.
///
/// Tool failures come back in-band with `status: "error"` and HTTP 200.
pub async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((session_id, tool_name)): Path<(String, String)>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let args = payload.map(|Json(value)| value).unwrap_or(Value::Null);

    let handle = state.sessions.get(&session_id)?;
    let mut session = handle.lock().await;
    let result = execute_tool(state.tools(), &tool_name, &args, &mut session.state).await;
    Ok(Json(result))
}
