use std::sync::Arc;

use corpus_agent::core::config::RagSettings;
use corpus_agent::core::security::DeletionSecret;
use corpus_agent::rag::existence::exists;
use corpus_agent::rag::memory::{BackendCall, InMemoryRagBackend};
use corpus_agent::rag::resolver::resolve;
use corpus_agent::rag::RetrievedContext;
use corpus_agent::session::{corpus_exists_key, current_corpus, SessionState, StateStore};
use corpus_agent::tools::{
    add_data, create_corpus, delete_corpus, delete_document, execute_tool, rag_query, ToolContext,
    ToolStatus,
};
use serde_json::json;

const PROJECT: &str = "demo-project";
const LOCATION: &str = "us-central1";

fn backend() -> Arc<InMemoryRagBackend> {
    Arc::new(InMemoryRagBackend::new(PROJECT, LOCATION))
}

fn settings() -> RagSettings {
    RagSettings {
        project_id: PROJECT.to_string(),
        location: LOCATION.to_string(),
        ..RagSettings::default()
    }
}

fn context(backend: &Arc<InMemoryRagBackend>) -> ToolContext {
    ToolContext::new(
        backend.clone(),
        settings(),
        DeletionSecret::new(Some("borrar todo".to_string())),
    )
}

#[tokio::test]
async fn resolve_is_identity_for_canonical_paths() {
    let backend = backend();
    backend.seed_corpus("123", "Math");
    for path in [
        "projects/demo-project/locations/us-central1/ragCorpora/123",
        "projects/x/locations/y/ragCorpora/z",
        "projects/a b/locations/c/ragCorpora/Math",
    ] {
        assert_eq!(resolve(backend.as_ref(), &settings(), path).await, path);
    }
    assert_eq!(backend.calls(BackendCall::ListCorpora), 0);
}

#[tokio::test]
async fn display_name_resolves_and_exists_is_cached() {
    let backend = backend();
    let path = backend.seed_corpus("123", "Math");
    let mut state = SessionState::new();

    assert_eq!(resolve(backend.as_ref(), &settings(), "Math").await, path);
    assert!(exists(backend.as_ref(), &settings(), "Math", &mut state).await);
    assert!(state.is_truthy(&corpus_exists_key("Math")));

    let listings = backend.calls(BackendCall::ListCorpora);
    assert!(exists(backend.as_ref(), &settings(), "Math", &mut state).await);
    assert_eq!(backend.calls(BackendCall::ListCorpora), listings);
}

#[tokio::test]
async fn create_is_a_no_op_for_existing_corpus() {
    let backend = backend();
    backend.seed_corpus("123", "Math");
    let ctx = context(&backend);
    let mut state = SessionState::new();

    let result = create_corpus(&ctx, "Math", &mut state).await;
    assert_eq!(result.status, ToolStatus::Info);
    assert_eq!(result.field("corpus_created"), Some(&json!(false)));
    assert_eq!(backend.calls(BackendCall::CreateCorpus), 0);
}

#[tokio::test]
async fn deletes_require_existing_corpus_and_confirmation() {
    let backend = backend();
    backend.seed_corpus("123", "Math");
    let ctx = context(&backend);
    let mut state = SessionState::new();

    let missing = delete_corpus(&ctx, "Ghost", true, &mut state).await;
    assert_eq!(missing.status, ToolStatus::Error);

    let unconfirmed = delete_corpus(&ctx, "Math", false, &mut state).await;
    assert_eq!(unconfirmed.status, ToolStatus::Error);
    assert!(unconfirmed.message.contains("confirmation"));

    let missing_doc = delete_document(&ctx, "Ghost", "1", true, &mut state).await;
    assert_eq!(missing_doc.status, ToolStatus::Error);

    let wrong_phrase = execute_tool(
        &ctx,
        "delete_corpus",
        &json!({"corpus_name": "Math", "confirm": true, "passphrase": "borrar"}),
        &mut state,
    )
    .await;
    assert_eq!(wrong_phrase.status, ToolStatus::Error);

    let unconfirmed_doc = execute_tool(
        &ctx,
        "delete_document",
        &json!({"corpus_name": "Math", "document_id": "1", "confirm": false, "passphrase": "borrar todo"}),
        &mut state,
    )
    .await;
    assert_eq!(unconfirmed_doc.status, ToolStatus::Error);

    assert_eq!(backend.calls(BackendCall::DeleteCorpus), 0);
    assert_eq!(backend.calls(BackendCall::DeleteFile), 0);
}

#[tokio::test]
async fn add_data_normalizes_mixed_sources() {
    let backend = backend();
    let path = backend.seed_corpus("123", "Math");
    let ctx = context(&backend);
    let mut state = SessionState::new();
    let paths: Vec<String> = [
        "https://docs.google.com/document/d/ABC123/edit",
        "https://drive.google.com/open?id=XYZ987",
        "gs://bucket/file.pdf",
        "not-a-path",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let result = add_data(&ctx, "Math", &paths, &mut state).await;
    assert!(result.is_success());
    assert_eq!(result.field("files_added"), Some(&json!(3)));
    assert_eq!(
        result.field("conversions"),
        Some(&json!([
            "https://docs.google.com/document/d/ABC123/edit -> https://drive.google.com/file/d/ABC123/view",
            "https://drive.google.com/open?id=XYZ987 -> https://drive.google.com/file/d/XYZ987/view"
        ]))
    );
    assert_eq!(
        result.field("invalid_paths"),
        Some(&json!(["not-a-path (not a valid path)"]))
    );

    let imports = backend.imports();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].corpus_path, path);
    assert_eq!(
        imports[0].source_uris,
        vec![
            "https://drive.google.com/file/d/ABC123/view".to_string(),
            "https://drive.google.com/file/d/XYZ987/view".to_string(),
            "gs://bucket/file.pdf".to_string(),
        ]
    );
}

#[tokio::test]
async fn add_data_with_only_invalid_paths_skips_import() {
    let backend = backend();
    backend.seed_corpus("123", "Math");
    let ctx = context(&backend);
    let mut state = SessionState::new();
    let paths = vec!["ftp://nope".to_string(), "C:\\docs\\a.pdf".to_string()];

    let result = add_data(&ctx, "Math", &paths, &mut state).await;
    assert_eq!(result.status, ToolStatus::Error);
    assert_eq!(
        result.field("invalid_paths"),
        Some(&json!([
            "ftp://nope (not a valid path)",
            "C:\\docs\\a.pdf (not a valid path)"
        ]))
    );
    assert_eq!(backend.calls(BackendCall::ImportFiles), 0);
}

#[tokio::test]
async fn query_with_zero_contexts_is_an_error() {
    let backend = backend();
    let path = backend.seed_corpus("123", "Math");
    let ctx = context(&backend);
    let mut state = SessionState::new();

    let result = rag_query(&ctx, "Math", "what is a ring?", &mut state).await;
    assert_eq!(result.status, ToolStatus::Error);
    assert_eq!(result.field("results_count"), Some(&json!(0)));
    assert_eq!(backend.calls(BackendCall::RetrievalQuery), 1);

    backend.seed_contexts(
        &path,
        vec![RetrievedContext {
            source_uri: Some("gs://bucket/rings.pdf".to_string()),
            source_name: Some("rings.pdf".to_string()),
            text: Some("A ring is a set with two operations".to_string()),
            score: Some(0.12),
        }],
    );
    let result = rag_query(&ctx, "Math", "what is a ring?", &mut state).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn create_then_delete_updates_session_state() {
    let backend = backend();
    let ctx = context(&backend);
    let mut state = SessionState::new();

    let created = create_corpus(&ctx, "Math", &mut state).await;
    assert!(created.is_success());
    assert_eq!(current_corpus(&state).as_deref(), Some("Math"));
    assert_eq!(state.get(&corpus_exists_key("Math")), Some(&json!(true)));

    let deleted = delete_corpus(&ctx, "Math", true, &mut state).await;
    assert!(deleted.is_success());
    assert_eq!(state.get(&corpus_exists_key("Math")), Some(&json!(false)));
    assert_eq!(current_corpus(&state).as_deref(), Some("Math"));
    assert!(backend.corpora().is_empty());
}

#[tokio::test]
async fn deleted_current_corpus_is_still_substituted() {
    let backend = backend();
    let ctx = context(&backend);
    let mut state = SessionState::new();

    create_corpus(&ctx, "Math", &mut state).await;
    delete_corpus(&ctx, "Math", true, &mut state).await;

    let result = execute_tool(&ctx, "get_corpus_info", &json!({}), &mut state).await;
    assert_eq!(result.status, ToolStatus::Error);
    assert_eq!(result.message, "Corpus 'Math' does not exist");
}

#[tokio::test]
async fn sessions_do_not_share_state() {
    let backend = backend();
    let ctx = context(&backend);
    let mut first = SessionState::new();
    let mut second = SessionState::new();

    create_corpus(&ctx, "Math", &mut first).await;
    assert!(current_corpus(&second).is_none());

    let result = execute_tool(&ctx, "rag_query", &json!({"query": "x"}), &mut second).await;
    assert!(result.message.starts_with("No corpus specified"));
}
