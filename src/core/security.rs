use std::env;
use std::fs;
use std::path::Path;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Uses `CORPUS_AGENT_SESSION_TOKEN` when set, otherwise generates a token and
/// writes it to `token_path` (owner-only on unix) for local clients.
pub fn init_session_token(token_path: &Path) -> SessionToken {
    if let Ok(token) = env::var("CORPUS_AGENT_SESSION_TOKEN") {
        if !token.trim().is_empty() {
            return SessionToken { value: token };
        }
    }

    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    if let Some(parent) = token_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(err) = fs::write(token_path, &token) {
        tracing::warn!("Failed to write session token: {}", err);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(token_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = fs::set_permissions(token_path, perms);
        }
    }

    SessionToken { value: token }
}

pub fn require_api_key(headers: &HeaderMap, expected: &SessionToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if !constant_time_eq(header_value, expected.value()) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

/// Passphrase the user must supply before any deletion runs.
///
/// Never rendered by `Debug`; unset means every deletion is refused.
#[derive(Clone, Default)]
pub struct DeletionSecret(Option<String>);

impl DeletionSecret {
    pub fn new(value: Option<String>) -> Self {
        Self(value.filter(|v| !v.is_empty()))
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    pub fn verify(&self, candidate: Option<&str>) -> bool {
        match (&self.0, candidate) {
            (Some(expected), Some(candidate)) => constant_time_eq(candidate.trim(), expected),
            _ => false,
        }
    }

    /// Masks every occurrence of the secret in `text`.
    pub fn redact(&self, text: &str) -> String {
        match &self.0 {
            Some(secret) => text.replace(secret.as_str(), "****"),
            None => text.to_string(),
        }
    }
}

impl std::fmt::Debug for DeletionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.is_configured() { "****" } else { "<unset>" };
        f.debug_tuple("DeletionSecret").field(&shown).finish()
    }
}

fn constant_time_eq(left: &str, right: &str) -> bool {
    left.as_bytes().ct_eq(right.as_bytes()).into()
}
