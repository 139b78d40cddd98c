//! Corpus identifier resolution.
//!
//! Maps whatever the caller typed (a canonical path, a display name, or a
//! raw candidate id) onto a canonical `projects/{p}/locations/{l}/ragCorpora/{id}`
//! path. Resolution never fails: a backend outage during the display-name
//! lookup only skips that step.

use std::sync::LazyLock;

use regex::Regex;

use super::backend::RagBackend;
use crate::core::best_effort::best_effort;
use crate::core::config::RagSettings;

static CANONICAL_CORPUS_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^projects/[^/]+/locations/[^/]+/ragCorpora/[^/]+$").expect("valid regex")
});

pub fn is_canonical(identifier: &str) -> bool {
    CANONICAL_CORPUS_PATH.is_match(identifier)
}

/// Replaces every character outside `[a-zA-Z0-9_-]` with `_`.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn compose_path(settings: &RagSettings, corpus_id: &str) -> String {
    format!(
        "projects/{}/locations/{}/ragCorpora/{}",
        settings.project_id, settings.location, corpus_id
    )
}

pub async fn resolve(backend: &dyn RagBackend, settings: &RagSettings, identifier: &str) -> String {
    if is_canonical(identifier) {
        return identifier.to_string();
    }

    let corpora = best_effort("corpus display-name lookup", backend.list_corpora(), Vec::new()).await;
    if let Some(corpus) = corpora.iter().find(|c| c.display_name == identifier) {
        return corpus.name.clone();
    }

    compose_path(settings, &candidate_id(identifier))
}

/// Last non-empty `/` segment, sanitized. Never empty, so the composed path
/// always matches the canonical grammar.
fn candidate_id(identifier: &str) -> String {
    let segment = identifier.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
    let id = sanitize_id(segment);
    if id.is_empty() {
        "_".to_string()
    } else {
        id
    }
}
