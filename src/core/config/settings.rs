//! Typed projections of the merged config tree.
//!
//! Validation runs before projection, so accessors here only fall back to
//! defaults for absent keys; they never second-guess present values.

use serde_json::Value;

use crate::core::security::DeletionSecret;

pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "publishers/google/models/text-embedding-005";
pub const DEFAULT_CHUNK_SIZE: u32 = 512;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 100;
pub const DEFAULT_EMBEDDING_REQUESTS_PER_MIN: u32 = 1000;
pub const DEFAULT_TOP_K: u32 = 3;
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_AGENT_MAX_STEPS: usize = 6;
pub const DEFAULT_TURNS_PER_MINUTE: u32 = 30;
/// Project id used by the in-memory backend when none is configured.
pub const LOCAL_PROJECT_ID: &str = "local";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Vertex,
    Memory,
}

impl BackendKind {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("memory") | Some("in_memory") => BackendKind::Memory,
            _ => BackendKind::Vertex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Vertex => "vertex",
            BackendKind::Memory => "memory",
        }
    }
}

#[derive(Clone)]
pub struct RagSettings {
    pub backend: BackendKind,
    pub project_id: String,
    pub location: String,
    pub embedding_model: String,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub embedding_requests_per_min: u32,
    pub top_k: u32,
    pub distance_threshold: f64,
    pub access_token: Option<String>,
}

impl std::fmt::Debug for RagSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagSettings")
            .field("backend", &self.backend)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("embedding_model", &self.embedding_model)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("embedding_requests_per_min", &self.embedding_requests_per_min)
            .field("top_k", &self.top_k)
            .field("distance_threshold", &self.distance_threshold)
            .field("access_token", &self.access_token.as_ref().map(|_| "****"))
            .finish()
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Vertex,
            project_id: String::new(),
            location: DEFAULT_LOCATION.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_requests_per_min: DEFAULT_EMBEDDING_REQUESTS_PER_MIN,
            top_k: DEFAULT_TOP_K,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            access_token: None,
        }
    }
}

#[derive(Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub turns_per_minute: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_AGENT_MAX_STEPS,
            turns_per_minute: DEFAULT_TURNS_PER_MINUTE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub rag: RagSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub server: ServerSettings,
    pub deletion_secret: DeletionSecret,
}

impl Settings {
    pub fn from_config(config: &Value) -> Self {
        let rag = config.get("rag").unwrap_or(&Value::Null);
        let llm = config.get("llm").unwrap_or(&Value::Null);
        let agent = config.get("agent").unwrap_or(&Value::Null);
        let server = config.get("server").unwrap_or(&Value::Null);
        let security = config.get("security").unwrap_or(&Value::Null);

        let rag_defaults = RagSettings::default();
        let backend = BackendKind::parse(rag.get("backend").and_then(|v| v.as_str()));
        let project_id = match (string_field(rag, "project_id"), backend) {
            (Some(project), _) => project,
            (None, BackendKind::Memory) => LOCAL_PROJECT_ID.to_string(),
            (None, BackendKind::Vertex) => String::new(),
        };
        let rag = RagSettings {
            backend,
            project_id,
            location: string_field(rag, "location").unwrap_or(rag_defaults.location),
            embedding_model: string_field(rag, "embedding_model")
                .unwrap_or(rag_defaults.embedding_model),
            chunk_size: u32_field(rag, "chunk_size").unwrap_or(rag_defaults.chunk_size),
            chunk_overlap: u32_field(rag, "chunk_overlap").unwrap_or(rag_defaults.chunk_overlap),
            embedding_requests_per_min: u32_field(rag, "embedding_requests_per_min")
                .unwrap_or(rag_defaults.embedding_requests_per_min),
            top_k: u32_field(rag, "top_k").unwrap_or(rag_defaults.top_k),
            distance_threshold: rag
                .get("distance_threshold")
                .and_then(|v| v.as_f64())
                .unwrap_or(rag_defaults.distance_threshold),
            access_token: string_field(rag, "access_token"),
        };

        let llm_defaults = LlmSettings::default();
        let llm = LlmSettings {
            base_url: string_field(llm, "base_url").unwrap_or(llm_defaults.base_url),
            model: string_field(llm, "model").unwrap_or(llm_defaults.model),
            api_key: string_field(llm, "api_key"),
            temperature: llm.get("temperature").and_then(|v| v.as_f64()),
        };

        let agent = AgentSettings {
            max_steps: agent
                .get("max_steps")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_AGENT_MAX_STEPS),
            turns_per_minute: u32_field(agent, "turns_per_minute")
                .unwrap_or(DEFAULT_TURNS_PER_MINUTE),
        };

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            host: string_field(server, "host").unwrap_or(server_defaults.host),
            port: server
                .get("port")
                .and_then(|v| v.as_u64())
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(server_defaults.port),
            allowed_origins: server
                .get("allowed_origins")
                .and_then(|v| v.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|item| item.as_str())
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Settings {
            rag,
            llm,
            agent,
            server,
            deletion_secret: DeletionSecret::new(string_field(security, "erase_password")),
        }
    }
}

fn string_field(section: &Value, key: &str) -> Option<String> {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn u32_field(section: &Value, key: &str) -> Option<u32> {
    section
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_uses_defaults() {
        let settings = Settings::from_config(&json!({}));
        assert_eq!(settings.rag.backend, BackendKind::Vertex);
        assert_eq!(settings.rag.location, DEFAULT_LOCATION);
        assert_eq!(settings.rag.chunk_size, 512);
        assert_eq!(settings.rag.chunk_overlap, 100);
        assert_eq!(settings.rag.embedding_requests_per_min, 1000);
        assert_eq!(settings.rag.top_k, 3);
        assert_eq!(settings.rag.distance_threshold, 0.5);
        assert_eq!(settings.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(settings.agent.max_steps, 6);
        assert!(!settings.deletion_secret.is_configured());
    }

    #[test]
    fn values_are_projected() {
        let settings = Settings::from_config(&json!({
            "rag": {
                "backend": "memory",
                "project_id": "demo-project",
                "location": "europe-west4",
                "top_k": 10,
                "distance_threshold": 0.3
            },
            "server": {"port": 8080, "allowed_origins": ["http://localhost:3000", " "]},
            "security": {"erase_password": "open sesame"}
        }));

        assert_eq!(settings.rag.backend, BackendKind::Memory);
        assert_eq!(settings.rag.project_id, "demo-project");
        assert_eq!(settings.rag.location, "europe-west4");
        assert_eq!(settings.rag.top_k, 10);
        assert_eq!(settings.rag.distance_threshold, 0.3);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.allowed_origins, vec!["http://localhost:3000"]);
        assert!(settings.deletion_secret.verify(Some("open sesame")));
    }

    #[test]
    fn memory_backend_gets_local_project() {
        let settings = Settings::from_config(&json!({"rag": {"backend": "memory"}}));
        assert_eq!(settings.rag.project_id, LOCAL_PROJECT_ID);
    }

    #[test]
    fn debug_output_hides_credentials() {
        let settings = Settings::from_config(&json!({
            "rag": {"access_token": "ya29.very-secret"},
            "llm": {"api_key": "AIza-secret"},
            "security": {"erase_password": "open sesame"}
        }));
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("ya29.very-secret"));
        assert!(!rendered.contains("AIza-secret"));
        assert!(!rendered.contains("open sesame"));
    }
}
