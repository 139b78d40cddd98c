//! Corpus lifecycle tools: list, create, inspect, delete, delete a document.

use serde::Serialize;
use serde_json::Value;

use super::{ToolContext, ToolResult};
use crate::core::best_effort::best_effort;
use crate::rag::existence::exists;
use crate::rag::resolver::{resolve, sanitize_id};
use crate::rag::EmbeddingModelConfig;
use crate::session::{corpus_exists_key, StateStore, CURRENT_CORPUS_KEY};

#[derive(Debug, Clone, Serialize)]
struct CorpusSummary {
    resource_name: String,
    display_name: String,
    create_time: String,
    update_time: String,
}

#[derive(Debug, Clone, Serialize)]
struct FileSummary {
    file_id: String,
    display_name: String,
    source_uri: String,
    create_time: String,
    update_time: String,
}

fn missing_corpus(corpus_name: &str) -> ToolResult {
    ToolResult::error(format!("Corpus '{}' does not exist", corpus_name))
        .with("corpus_name", corpus_name)
}

pub async fn list_corpora(ctx: &ToolContext) -> ToolResult {
    match ctx.backend().list_corpora().await {
        Ok(corpora) => {
            let corpora: Vec<CorpusSummary> = corpora
                .into_iter()
                .map(|corpus| CorpusSummary {
                    resource_name: corpus.name,
                    display_name: corpus.display_name,
                    create_time: corpus.create_time.unwrap_or_default(),
                    update_time: corpus.update_time.unwrap_or_default(),
                })
                .collect();
            ToolResult::success(format!("Found {} available corpora", corpora.len()))
                .with("corpora", corpora)
        }
        Err(err) => {
            tracing::error!("Listing corpora failed: {}", err);
            ToolResult::error(format!("Error listing corpora: {}", err))
                .with("corpora", Vec::<Value>::new())
        }
    }
}

pub async fn create_corpus(
    ctx: &ToolContext,
    corpus_name: &str,
    state: &mut dyn StateStore,
) -> ToolResult {
    if exists(ctx.backend(), &ctx.rag, corpus_name, state).await {
        return ToolResult::info(format!("Corpus '{}' already exists", corpus_name))
            .with("corpus_name", corpus_name)
            .with("corpus_created", false);
    }

    let display_name = sanitize_id(corpus_name);
    let embedding = EmbeddingModelConfig {
        publisher_model: ctx.rag.embedding_model.clone(),
    };

    match ctx.backend().create_corpus(&display_name, &embedding).await {
        Ok(corpus) => {
            state.set(&corpus_exists_key(corpus_name), Value::Bool(true));
            state.set(CURRENT_CORPUS_KEY, Value::String(corpus_name.to_string()));
            tracing::info!("Created corpus '{}' as {}", corpus_name, corpus.name);
            ToolResult::success(format!("Corpus '{}' created successfully", corpus_name))
                .with("corpus_name", corpus.name)
                .with("display_name", corpus.display_name)
                .with("corpus_created", true)
        }
        Err(err) => {
            tracing::error!("Creating corpus '{}' failed: {}", corpus_name, err);
            ToolResult::error(format!("Error creating corpus: {}", err))
                .with("corpus_name", corpus_name)
                .with("corpus_created", false)
        }
    }
}

/// Deletes a corpus. `confirm` must already reflect any passphrase check.
pub async fn delete_corpus(
    ctx: &ToolContext,
    corpus_name: &str,
    confirm: bool,
    state: &mut dyn StateStore,
) -> ToolResult {
    if !exists(ctx.backend(), &ctx.rag, corpus_name, state).await {
        return missing_corpus(corpus_name);
    }

    if !confirm {
        return ToolResult::error(format!(
            "Corpus '{}' cannot be deleted without confirmation",
            corpus_name
        ))
        .with("corpus_name", corpus_name);
    }

    let corpus_path = resolve(ctx.backend(), &ctx.rag, corpus_name).await;
    match ctx.backend().delete_corpus(&corpus_path).await {
        Ok(()) => {
            // current_corpus is left pointing at the deleted corpus
            state.set(&corpus_exists_key(corpus_name), Value::Bool(false));
            tracing::info!("Deleted corpus '{}' ({})", corpus_name, corpus_path);
            ToolResult::success(format!("Corpus '{}' deleted successfully", corpus_name))
                .with("corpus_name", corpus_name)
        }
        Err(err) => {
            tracing::error!("Deleting corpus '{}' failed: {}", corpus_name, err);
            ToolResult::error(format!("Error deleting corpus '{}'", corpus_name))
                .with("corpus_name", corpus_name)
        }
    }
}

pub async fn get_corpus_info(
    ctx: &ToolContext,
    corpus_name: &str,
    state: &mut dyn StateStore,
) -> ToolResult {
    if !exists(ctx.backend(), &ctx.rag, corpus_name, state).await {
        return missing_corpus(corpus_name);
    }

    let corpus_path = resolve(ctx.backend(), &ctx.rag, corpus_name).await;
    let files = best_effort(
        "corpus file listing",
        ctx.backend().list_files(&corpus_path),
        Vec::new(),
    )
    .await;

    let files: Vec<FileSummary> = files
        .into_iter()
        .map(|file| FileSummary {
            file_id: file.name.rsplit('/').next().unwrap_or_default().to_string(),
            display_name: file.display_name.unwrap_or_default(),
            source_uri: file.source_uri.unwrap_or_default(),
            create_time: file.create_time.unwrap_or_default(),
            update_time: file.update_time.unwrap_or_default(),
        })
        .collect();

    ToolResult::success(format!(
        "Retrieved information for corpus '{}'",
        corpus_name
    ))
    .with("corpus_name", corpus_name)
    .with("file_count", files.len())
    .with("files", files)
}

pub async fn delete_document(
    ctx: &ToolContext,
    corpus_name: &str,
    document_id: &str,
    confirm: bool,
    state: &mut dyn StateStore,
) -> ToolResult {
    if !exists(ctx.backend(), &ctx.rag, corpus_name, state).await {
        return missing_corpus(corpus_name).with("document_id", document_id);
    }

    if !confirm {
        return ToolResult::error(format!(
            "Document '{}' cannot be deleted without confirmation",
            document_id
        ))
        .with("corpus_name", corpus_name)
        .with("document_id", document_id);
    }

    let corpus_path = resolve(ctx.backend(), &ctx.rag, corpus_name).await;
    let file_path = format!("{}/ragFiles/{}", corpus_path, document_id);
    match ctx.backend().delete_file(&file_path).await {
        Ok(()) => {
            tracing::info!("Deleted document {} from corpus '{}'", document_id, corpus_name);
            ToolResult::success(format!(
                "Document '{}' deleted successfully from corpus '{}'",
                document_id, corpus_name
            ))
            .with("corpus_name", corpus_name)
            .with("document_id", document_id)
        }
        Err(err) => {
            tracing::error!(
                "Deleting document {} from corpus '{}' failed: {}",
                document_id,
                corpus_name,
                err
            );
            ToolResult::error(format!(
                "Error deleting document '{}' from corpus '{}'",
                document_id, corpus_name
            ))
            .with("corpus_name", corpus_name)
            .with("document_id", document_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::memory::{BackendCall, InMemoryRagBackend};
    use crate::rag::FileRecord;
    use crate::session::{current_corpus, SessionState};
    use crate::tools::ToolStatus;
    use std::sync::Arc;

    fn context(backend: Arc<InMemoryRagBackend>) -> ToolContext {
        ToolContext::for_backend(backend, "demo")
    }

    #[tokio::test]
    async fn list_reports_backend_failure() {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        backend.fail_on(BackendCall::ListCorpora);
        let result = list_corpora(&context(backend)).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.starts_with("Error listing corpora:"));
        assert_eq!(result.field("corpora"), Some(&serde_json::json!([])));
    }

    #[tokio::test]
    async fn create_sanitizes_display_name() {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        let ctx = context(backend.clone());
        let mut state = SessionState::new();

        let result = create_corpus(&ctx, "Física 1", &mut state).await;
        assert!(result.is_success());
        assert_eq!(result.field("display_name"), Some(&serde_json::json!("F_sica_1")));
        assert_eq!(current_corpus(&state).as_deref(), Some("Física 1"));
    }

    #[tokio::test]
    async fn create_failure_leaves_state_alone() {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        backend.fail_on(BackendCall::CreateCorpus);
        let ctx = context(backend.clone());
        let mut state = SessionState::new();

        let result = create_corpus(&ctx, "Math", &mut state).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.starts_with("Error creating corpus:"));
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn delete_backend_error_keeps_cache() {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        backend.seed_corpus("1", "Math");
        backend.fail_on(BackendCall::DeleteCorpus);
        let ctx = context(backend.clone());
        let mut state = SessionState::new();

        let result = delete_corpus(&ctx, "Math", true, &mut state).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.message, "Error deleting corpus 'Math'");
        assert!(state.is_truthy(&corpus_exists_key("Math")));
    }

    #[tokio::test]
    async fn info_lists_files_and_tolerates_listing_failure() {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        let path = backend.seed_corpus("1", "Math");
        backend.seed_file(
            &path,
            FileRecord {
                name: format!("{}/ragFiles/77", path),
                display_name: Some("algebra.pdf".to_string()),
                source_uri: Some("gs://bucket/algebra.pdf".to_string()),
                create_time: None,
                update_time: None,
            },
        );
        let ctx = context(backend.clone());
        let mut state = SessionState::new();

        let result = get_corpus_info(&ctx, "Math", &mut state).await;
        assert!(result.is_success());
        assert_eq!(result.field("file_count"), Some(&serde_json::json!(1)));
        let files = result.field("files").cloned().unwrap_or_default();
        assert_eq!(files[0]["file_id"], "77");
        assert_eq!(files[0]["create_time"], "");

        backend.fail_on(BackendCall::ListFiles);
        let result = get_corpus_info(&ctx, "Math", &mut state).await;
        assert!(result.is_success());
        assert_eq!(result.field("file_count"), Some(&serde_json::json!(0)));
    }

    #[tokio::test]
    async fn delete_document_targets_file_path() {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        let path = backend.seed_corpus("1", "Math");
        backend.seed_file(
            &path,
            FileRecord {
                name: format!("{}/ragFiles/77", path),
                display_name: None,
                source_uri: None,
                create_time: None,
                update_time: None,
            },
        );
        let ctx = context(backend.clone());
        let mut state = SessionState::new();

        let unconfirmed = delete_document(&ctx, "Math", "77", false, &mut state).await;
        assert_eq!(unconfirmed.status, ToolStatus::Error);
        assert!(unconfirmed.message.contains("confirmation"));
        assert_eq!(backend.calls(BackendCall::DeleteFile), 0);

        let result = delete_document(&ctx, "Math", "77", true, &mut state).await;
        assert!(result.is_success());
        assert_eq!(backend.deleted_files(), vec![format!("{}/ragFiles/77", path)]);

        let missing = delete_document(&ctx, "Ghost", "77", false, &mut state).await;
        assert_eq!(missing.status, ToolStatus::Error);
        assert!(missing.message.contains("does not exist"));
        assert_eq!(backend.calls(BackendCall::DeleteFile), 1);
    }
}
