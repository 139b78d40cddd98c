use serde_json::Value;

use super::{ToolContext, ToolResult};
use crate::rag::existence::exists;
use crate::rag::resolver::resolve;
use crate::rag::sources::normalize_sources;
use crate::rag::ImportConfig;
use crate::session::{StateStore, CURRENT_CORPUS_KEY};

/// Imports Drive, Docs and `gs://` sources into an existing corpus.
///
/// Unrecognized paths are reported back rather than failing the batch. Backend
/// errors are logged but surface to the caller only as a generic failure.
pub async fn add_data(
    ctx: &ToolContext,
    corpus_name: &str,
    paths: &[String],
    state: &mut dyn StateStore,
) -> ToolResult {
    if !exists(ctx.backend(), &ctx.rag, corpus_name, state).await {
        return ToolResult::error(format!("Corpus '{}' does not exist", corpus_name))
            .with("corpus_name", corpus_name)
            .with("paths", paths);
    }

    if paths.is_empty() {
        return ToolResult::error(
            "Invalid paths, please provide Drive, GCS or Google Docs/Sheets/Slides URLs",
        )
        .with("corpus_name", corpus_name)
        .with("paths", paths);
    }

    let sources = normalize_sources(paths);
    if sources.valid.is_empty() {
        return ToolResult::error("No valid paths were provided")
            .with("corpus_name", corpus_name)
            .with("invalid_paths", &sources.invalid);
    }

    let corpus_path = resolve(ctx.backend(), &ctx.rag, corpus_name).await;
    let config = ImportConfig {
        chunk_size: ctx.rag.chunk_size,
        chunk_overlap: ctx.rag.chunk_overlap,
        max_embedding_requests_per_min: ctx.rag.embedding_requests_per_min,
    };

    match ctx
        .backend()
        .import_files(&corpus_path, &sources.valid, &config)
        .await
    {
        Ok(imported) => {
            if !state.is_truthy(CURRENT_CORPUS_KEY) {
                state.set(CURRENT_CORPUS_KEY, Value::String(corpus_name.to_string()));
            }
            let note = if sources.conversions.is_empty() {
                ""
            } else {
                " (converted Google Docs URLs to Drive format)"
            };
            tracing::info!(
                "Imported {} file(s) into corpus '{}' ({} invalid path(s) skipped)",
                imported,
                corpus_name,
                sources.invalid.len()
            );
            ToolResult::success(format!(
                "Successfully added {} file(s){} to corpus '{}'",
                imported, note, corpus_name
            ))
            .with("corpus_name", corpus_name)
            .with("files_added", imported)
            .with("paths", &sources.valid)
            .with("invalid_paths", &sources.invalid)
            .with("conversions", &sources.conversions)
        }
        Err(err) => {
            tracing::error!("Import into corpus '{}' failed: {}", corpus_name, err);
            ToolResult::error(format!("Failed to add data to corpus '{}'", corpus_name))
                .with("corpus_name", corpus_name)
                .with("paths", paths)
        }
    }
}
