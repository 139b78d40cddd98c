use serde::Serialize;

use super::{ToolContext, ToolResult};
use crate::rag::existence::exists;
use crate::rag::resolver::resolve;
use crate::rag::RetrievalConfig;
use crate::session::StateStore;

#[derive(Debug, Clone, Serialize)]
struct QueryHit {
    source_uri: String,
    source_name: String,
    text: String,
    score: f64,
}

/// Retrieves the best-matching contexts for `query` from one corpus.
///
/// Zero hits is reported as an error, same as a failed retrieval call.
pub async fn rag_query(
    ctx: &ToolContext,
    corpus_name: &str,
    query: &str,
    state: &mut dyn StateStore,
) -> ToolResult {
    if !exists(ctx.backend(), &ctx.rag, corpus_name, state).await {
        return ToolResult::error(format!("Corpus '{}' does not exist", corpus_name))
            .with("corpus_name", corpus_name);
    }

    let corpus_path = resolve(ctx.backend(), &ctx.rag, corpus_name).await;
    let config = RetrievalConfig {
        top_k: ctx.rag.top_k,
        vector_distance_threshold: ctx.rag.distance_threshold,
    };

    tracing::debug!("Running retrieval against {}", corpus_path);
    let contexts = match ctx
        .backend()
        .retrieval_query(&[corpus_path], query, &config)
        .await
    {
        Ok(contexts) => contexts,
        Err(err) => {
            tracing::error!("Error querying corpus '{}': {}", corpus_name, err);
            return ToolResult::error(format!("Error querying corpus: {}", err))
                .with("query", query)
                .with("corpus_name", corpus_name);
        }
    };

    let results: Vec<QueryHit> = contexts
        .into_iter()
        .map(|ctx| QueryHit {
            source_uri: ctx.source_uri.unwrap_or_default(),
            source_name: ctx.source_name.unwrap_or_default(),
            text: ctx.text.unwrap_or_default(),
            score: ctx.score.unwrap_or(0.0),
        })
        .collect();

    if results.is_empty() {
        return ToolResult::error(format!(
            "No results found in corpus '{}' for query '{}'",
            corpus_name, query
        ))
        .with("query", query)
        .with("corpus_name", corpus_name)
        .with("results", &results)
        .with("results_count", 0);
    }

    ToolResult::success(format!(
        "Found results for '{}' in corpus '{}'",
        query, corpus_name
    ))
    .with("query", query)
    .with("corpus_name", corpus_name)
    .with("results_count", results.len())
    .with("results", results)
}
