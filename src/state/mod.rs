use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::agent::AgentRuntime;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::security::{init_session_token, SessionToken};
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::rag::{build_backend, RagBackend};
use crate::session::SessionManager;
use crate::tools::ToolContext;

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Holds the loaded settings, the live sessions, and the agent runtime that
/// owns the RAG backend and LLM provider handles.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub session_token: SessionToken,
    pub sessions: SessionManager,
    pub agent: AgentRuntime,
    pub chat_limiter: Arc<DefaultDirectRateLimiter>,
}

impl AppState {
    /// Loads configuration, then builds the RAG backend and LLM provider
    /// selected by it.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let session_token = init_session_token(&paths.session_token_path);

        let backend =
            build_backend(&settings.rag).map_err(|e| InitializationError::Rag(e.into()))?;
        let llm = OpenAiCompatProvider::new(&settings.llm)
            .map_err(|e| InitializationError::Llm(e.into()))?;

        if !settings.deletion_secret.is_configured() {
            tracing::warn!("No deletion passphrase configured; corpus and document deletion is disabled");
        }
        tracing::info!(
            "RAG backend: {} (project '{}', location '{}'), LLM model: {}",
            settings.rag.backend.as_str(),
            settings.rag.project_id,
            settings.rag.location,
            settings.llm.model
        );

        Ok(Self::from_parts(
            paths,
            config,
            settings,
            session_token,
            backend,
            Arc::new(llm),
        ))
    }

    /// Wires already-built collaborators together.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        session_token: SessionToken,
        backend: Arc<dyn RagBackend>,
        llm: Arc<dyn LlmProvider>,
    ) -> Arc<Self> {
        let tools = ToolContext::new(
            backend,
            settings.rag.clone(),
            settings.deletion_secret.clone(),
        );
        let agent = AgentRuntime::new(
            llm,
            tools,
            settings.agent.clone(),
            settings.llm.temperature,
            settings.deletion_secret.is_configured(),
        );
        let per_minute =
            NonZeroU32::new(settings.agent.turns_per_minute).unwrap_or(NonZeroU32::MIN);
        let chat_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            session_token,
            sessions: SessionManager::new(),
            agent,
            chat_limiter,
        })
    }

    pub fn tools(&self) -> &ToolContext {
        self.agent.tools()
    }
}
