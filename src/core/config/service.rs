use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 12] = [
    "api_key",
    "secret",
    "password",
    "passphrase",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "access_token",
    "refresh_token",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 4] = ["max_tokens", "total_tokens", "token_count", "tokens"];

/// Environment variables that override config keys, with the value type
/// expected at the target path.
const ENV_OVERRIDES: [(&str, &str, &str, EnvKind); 14] = [
    ("GOOGLE_CLOUD_PROJECT", "rag", "project_id", EnvKind::Text),
    ("GOOGLE_CLOUD_LOCATION", "rag", "location", EnvKind::Text),
    ("CORPUS_AGENT_BACKEND", "rag", "backend", EnvKind::Text),
    ("RAG_CHUNK_SIZE", "rag", "chunk_size", EnvKind::Integer),
    ("RAG_CHUNK_OVERLAP", "rag", "chunk_overlap", EnvKind::Integer),
    (
        "RAG_EMBEDDING_REQUESTS_PER_MIN",
        "rag",
        "embedding_requests_per_min",
        EnvKind::Integer,
    ),
    ("RAG_TOP_K", "rag", "top_k", EnvKind::Integer),
    ("RAG_DISTANCE_THRESHOLD", "rag", "distance_threshold", EnvKind::Float),
    ("GOOGLE_ACCESS_TOKEN", "rag", "access_token", EnvKind::Text),
    ("ERASE_PASSWORD", "security", "erase_password", EnvKind::Text),
    ("LLM_BASE_URL", "llm", "base_url", EnvKind::Text),
    ("LLM_MODEL", "llm", "model", EnvKind::Text),
    ("GEMINI_API_KEY", "llm", "api_key", EnvKind::Text),
    ("PORT", "server", "port", EnvKind::Integer),
];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Text,
    Integer,
    Float,
}

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        self.paths.config_path()
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with secrets, then environment overrides.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let mut merged = self.load_files()?;
        apply_env_overrides(&mut merged, |key| env::var(key).ok());
        Ok(merged)
    }

    fn load_files(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let config = self.load_config()?;
        validate_config(&config)?;
        Ok(Settings::from_config(&config))
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ApiError::BadRequest(format!(
            "Invalid config file '{}': expected a mapping at the root",
            path.display()
        ))),
        Err(err) => Err(ApiError::BadRequest(format!(
            "Invalid config file '{}': {}",
            path.display(),
            err
        ))),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if !config.is_object() {
        *config = Value::Object(Map::new());
    }

    for (var, section, key, kind) in ENV_OVERRIDES {
        let Some(raw) = lookup(var).map(|v| v.trim().to_string()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }

        let value = match kind {
            EnvKind::Text => Value::String(raw),
            EnvKind::Integer => match raw.parse::<u64>() {
                Ok(number) => Value::from(number),
                Err(_) => {
                    tracing::warn!("Ignoring {}: expected an integer", var);
                    continue;
                }
            },
            EnvKind::Float => match raw.parse::<f64>() {
                Ok(number) => Value::from(number),
                Err(_) => {
                    tracing::warn!("Ignoring {}: expected a number", var);
                    continue;
                }
            },
        };

        if let Some(root) = config.as_object_mut() {
            let entry = root
                .entry(section.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(section_map) = entry.as_object_mut() {
                section_map.insert(key.to_string(), value);
            }
        }
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

pub(crate) fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

pub(crate) fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
