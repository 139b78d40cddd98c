//! Session-scoped corpus existence cache.
//!
//! A positive verdict is memoized under `corpus_exists_{identifier}` and is
//! never re-verified while it stays truthy. Negative verdicts are not cached.

use serde_json::Value;

use super::backend::RagBackend;
use super::resolver::resolve;
use crate::core::config::RagSettings;
use crate::session::{corpus_exists_key, StateStore, CURRENT_CORPUS_KEY};

pub async fn exists(
    backend: &dyn RagBackend,
    settings: &RagSettings,
    identifier: &str,
    state: &mut dyn StateStore,
) -> bool {
    let key = corpus_exists_key(identifier);
    if state.is_truthy(&key) {
        return true;
    }

    let resolved = resolve(backend, settings, identifier).await;
    let corpora = match backend.list_corpora().await {
        Ok(corpora) => corpora,
        Err(err) => {
            tracing::warn!("Existence check for corpus '{}' failed: {}", identifier, err);
            return false;
        }
    };

    let found = corpora
        .iter()
        .any(|corpus| corpus.name == resolved || corpus.display_name == identifier);
    if !found {
        return false;
    }

    state.set(&key, Value::Bool(true));
    if !state.is_truthy(CURRENT_CORPUS_KEY) {
        state.set(CURRENT_CORPUS_KEY, Value::String(identifier.to_string()));
    }
    true
}

/// Points the session's current corpus at `identifier` if it exists.
pub async fn set_current(
    backend: &dyn RagBackend,
    settings: &RagSettings,
    identifier: &str,
    state: &mut dyn StateStore,
) -> bool {
    if !exists(backend, settings, identifier, state).await {
        return false;
    }
    state.set(CURRENT_CORPUS_KEY, Value::String(identifier.to_string()));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::memory::{BackendCall, InMemoryRagBackend};
    use crate::session::{current_corpus, SessionState};
    use serde_json::json;

    fn settings() -> RagSettings {
        RagSettings {
            project_id: "demo".to_string(),
            ..RagSettings::default()
        }
    }

    #[tokio::test]
    async fn hit_is_cached_and_sets_current_once() {
        let backend = InMemoryRagBackend::new("demo", "us-central1");
        backend.seed_corpus("1", "Math");
        backend.seed_corpus("2", "History");
        let mut state = SessionState::new();

        assert!(exists(&backend, &settings(), "Math", &mut state).await);
        assert_eq!(current_corpus(&state).as_deref(), Some("Math"));
        let listings = backend.calls(BackendCall::ListCorpora);

        assert!(exists(&backend, &settings(), "Math", &mut state).await);
        assert_eq!(backend.calls(BackendCall::ListCorpora), listings);

        assert!(exists(&backend, &settings(), "History", &mut state).await);
        assert_eq!(current_corpus(&state).as_deref(), Some("Math"));
    }

    #[tokio::test]
    async fn miss_leaves_state_untouched() {
        let backend = InMemoryRagBackend::new("demo", "us-central1");
        let mut state = SessionState::new();
        assert!(!exists(&backend, &settings(), "Ghost", &mut state).await);
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn canonical_path_matches_by_name() {
        let backend = InMemoryRagBackend::new("demo", "us-central1");
        let path = backend.seed_corpus("9", "Biology");
        let mut state = SessionState::new();
        assert!(exists(&backend, &settings(), &path, &mut state).await);
        assert!(state.is_truthy(&corpus_exists_key(&path)));
    }

    #[tokio::test]
    async fn listing_error_reads_as_missing() {
        let backend = InMemoryRagBackend::new("demo", "us-central1");
        backend.seed_corpus("1", "Math");
        backend.fail_on(BackendCall::ListCorpora);
        let mut state = SessionState::new();
        assert!(!exists(&backend, &settings(), "Math", &mut state).await);
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn false_flag_forces_recheck() {
        let backend = InMemoryRagBackend::new("demo", "us-central1");
        let mut state = SessionState::new();
        state.set(&corpus_exists_key("Math"), json!(false));
        assert!(!exists(&backend, &settings(), "Math", &mut state).await);
        assert!(backend.calls(BackendCall::ListCorpora) > 0);
    }

    #[tokio::test]
    async fn set_current_overwrites_pointer() {
        let backend = InMemoryRagBackend::new("demo", "us-central1");
        backend.seed_corpus("1", "Math");
        backend.seed_corpus("2", "History");
        let mut state = SessionState::new();
        state.set(CURRENT_CORPUS_KEY, json!("Math"));

        assert!(set_current(&backend, &settings(), "History", &mut state).await);
        assert_eq!(current_corpus(&state).as_deref(), Some("History"));

        assert!(!set_current(&backend, &settings(), "Ghost", &mut state).await);
        assert_eq!(current_corpus(&state).as_deref(), Some("History"));
    }
}
