use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{current_corpus, SessionState};
use crate::core::errors::ApiError;
use crate::llm::ChatMessage;

/// One conversation: its key-value state plus the chat transcript.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
    pub history: Vec<ChatMessage>,
}

impl Session {
    pub fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: SessionState::new(),
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub current_corpus: Option<String>,
    pub message_count: usize,
}

/// In-memory registry of live sessions.
///
/// Each session sits behind its own async mutex; holding it for a whole tool
/// call serializes operations against one session's state.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Result<String, ApiError> {
        let id = Uuid::new_v4().to_string();
        let mut map = self.sessions.write().map_err(ApiError::internal)?;
        map.insert(id.clone(), Arc::new(Mutex::new(Session::new(id.clone()))));
        tracing::info!("Created session {}", id);
        Ok(id)
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, ApiError> {
        let map = self.sessions.read().map_err(ApiError::internal)?;
        map.get(session_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))
    }

    pub fn remove(&self, session_id: &str) -> Result<bool, ApiError> {
        let mut map = self.sessions.write().map_err(ApiError::internal)?;
        let removed = map.remove(session_id).is_some();
        if removed {
            tracing::info!("Discarded session {}", session_id);
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<SessionSummary>, ApiError> {
        let handles: Vec<Arc<Mutex<Session>>> = {
            let map = self.sessions.read().map_err(ApiError::internal)?;
            map.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let session = handle.lock().await;
            summaries.push(SessionSummary {
                id: session.id.clone(),
                created_at: session.created_at,
                current_corpus: current_corpus(&session.state),
                message_count: session.history.len(),
            });
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(summaries)
    }
}
