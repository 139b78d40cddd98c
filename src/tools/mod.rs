//! Corpus-management tools exposed to the conversational agent.
//!
//! Each tool takes the caller's session state explicitly and always returns a
//! [`ToolResult`]; failures are reported in-band with `status: "error"`.
//! [`execute_tool`] is the single entry point used by both the agent loop and
//! the direct-invocation HTTP route.

mod corpus;
mod ingest;
mod query;
mod result;

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use corpus::{create_corpus, delete_corpus, delete_document, get_corpus_info, list_corpora};
pub use ingest::add_data;
pub use query::rag_query;
pub use result::{ToolResult, ToolStatus};

use crate::core::config::service::redact_sensitive_values;
use crate::core::config::RagSettings;
use crate::core::security::DeletionSecret;
use crate::rag::RagBackend;
use crate::session::{current_corpus, StateStore};

/// Everything a tool needs besides the session state.
#[derive(Clone)]
pub struct ToolContext {
    backend: Arc<dyn RagBackend>,
    pub rag: RagSettings,
    deletion_secret: DeletionSecret,
}

impl ToolContext {
    pub fn new(
        backend: Arc<dyn RagBackend>,
        rag: RagSettings,
        deletion_secret: DeletionSecret,
    ) -> Self {
        Self {
            backend,
            rag,
            deletion_secret,
        }
    }

    /// Default RAG settings for `project_id`, no deletion secret.
    pub fn for_backend(backend: Arc<dyn RagBackend>, project_id: &str) -> Self {
        let rag = RagSettings {
            project_id: project_id.to_string(),
            ..RagSettings::default()
        };
        Self::new(backend, rag, DeletionSecret::default())
    }

    pub fn with_deletion_secret(mut self, secret: DeletionSecret) -> Self {
        self.deletion_secret = secret;
        self
    }

    pub fn backend(&self) -> &dyn RagBackend {
        self.backend.as_ref()
    }

    fn deletion_confirmed(&self, confirm: bool, passphrase: Option<&str>) -> bool {
        confirm && self.deletion_secret.verify(passphrase)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RagQueryArgs {
    /// Corpus to search. Empty uses the session's current corpus.
    #[serde(default)]
    pub corpus_name: String,
    /// Natural-language question.
    pub query: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListCorporaArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateCorpusArgs {
    /// Name for the new corpus.
    pub corpus_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddDataArgs {
    /// Target corpus. Empty uses the session's current corpus.
    #[serde(default)]
    pub corpus_name: String,
    /// Google Drive, Docs/Sheets/Slides or gs:// URLs.
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetCorpusInfoArgs {
    /// Corpus to inspect. Empty uses the session's current corpus.
    #[serde(default)]
    pub corpus_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteCorpusArgs {
    /// Corpus to delete. Empty uses the session's current corpus.
    #[serde(default)]
    pub corpus_name: String,
    /// Must be true, after the user explicitly confirmed.
    #[serde(default)]
    pub confirm: bool,
    /// Deletion passphrase exactly as the user typed it.
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteDocumentArgs {
    /// Corpus holding the document. Empty uses the session's current corpus.
    #[serde(default)]
    pub corpus_name: String,
    /// File id as reported by get_corpus_info.
    pub document_id: String,
    /// Must be true, after the user explicitly confirmed.
    #[serde(default)]
    pub confirm: bool,
    /// Deletion passphrase exactly as the user typed it.
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "rag_query",
            description: "Answer a question from the documents indexed in a corpus.",
            parameters: schema_of::<RagQueryArgs>(),
        },
        ToolDefinition {
            name: "list_corpora",
            description: "List every available corpus with its resource name and timestamps.",
            parameters: schema_of::<ListCorporaArgs>(),
        },
        ToolDefinition {
            name: "create_corpus",
            description: "Create a new corpus and make it the current corpus.",
            parameters: schema_of::<CreateCorpusArgs>(),
        },
        ToolDefinition {
            name: "add_data",
            description: "Import Google Drive, Docs/Sheets/Slides or gs:// files into a corpus.",
            parameters: schema_of::<AddDataArgs>(),
        },
        ToolDefinition {
            name: "get_corpus_info",
            description: "Show a corpus and the files it contains.",
            parameters: schema_of::<GetCorpusInfoArgs>(),
        },
        ToolDefinition {
            name: "delete_corpus",
            description: "Delete a corpus. Requires confirm=true and the deletion passphrase.",
            parameters: schema_of::<DeleteCorpusArgs>(),
        },
        ToolDefinition {
            name: "delete_document",
            description: "Delete one document from a corpus. Requires confirm=true and the deletion passphrase.",
            parameters: schema_of::<DeleteDocumentArgs>(),
        },
    ]
}

fn parse_args<T: DeserializeOwned>(tool_name: &str, args: &Value) -> Result<T, ToolResult> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|err| {
        ToolResult::error(format!("Invalid arguments for {}: {}", tool_name, err))
    })
}

/// An empty corpus name falls back to the session's current corpus.
fn corpus_or_current(requested: &str, state: &dyn StateStore) -> Result<String, ToolResult> {
    let requested = requested.trim();
    if !requested.is_empty() {
        return Ok(requested.to_string());
    }
    current_corpus(state).ok_or_else(|| {
        ToolResult::error(
            "No corpus specified and no current corpus is set. Name a corpus or create one first.",
        )
    })
}

pub async fn execute_tool(
    ctx: &ToolContext,
    tool_name: &str,
    args: &Value,
    state: &mut dyn StateStore,
) -> ToolResult {
    tracing::info!(
        "Executing tool {} with args {}",
        tool_name,
        redact_sensitive_values(args)
    );

    let result = match dispatch(ctx, tool_name, args, state).await {
        Ok(result) | Err(result) => result,
    };

    tracing::debug!("Tool {} finished with status {:?}", tool_name, result.status);
    result
}

async fn dispatch(
    ctx: &ToolContext,
    tool_name: &str,
    args: &Value,
    state: &mut dyn StateStore,
) -> Result<ToolResult, ToolResult> {
    let result = match tool_name {
        "rag_query" => {
            let args: RagQueryArgs = parse_args(tool_name, args)?;
            let corpus = corpus_or_current(&args.corpus_name, &*state)?;
            rag_query(ctx, &corpus, &args.query, state).await
        }
        "list_corpora" => {
            let _: ListCorporaArgs = parse_args(tool_name, args)?;
            list_corpora(ctx).await
        }
        "create_corpus" => {
            let args: CreateCorpusArgs = parse_args(tool_name, args)?;
            let name = args.corpus_name.trim();
            if name.is_empty() {
                return Err(ToolResult::error("corpus_name is required to create a corpus"));
            }
            create_corpus(ctx, name, state).await
        }
        "add_data" => {
            let args: AddDataArgs = parse_args(tool_name, args)?;
            let corpus = corpus_or_current(&args.corpus_name, &*state)?;
            add_data(ctx, &corpus, &args.paths, state).await
        }
        "get_corpus_info" => {
            let args: GetCorpusInfoArgs = parse_args(tool_name, args)?;
            let corpus = corpus_or_current(&args.corpus_name, &*state)?;
            get_corpus_info(ctx, &corpus, state).await
        }
        "delete_corpus" => {
            let args: DeleteCorpusArgs = parse_args(tool_name, args)?;
            let corpus = corpus_or_current(&args.corpus_name, &*state)?;
            let confirmed = ctx.deletion_confirmed(args.confirm, args.passphrase.as_deref());
            if args.confirm && !confirmed {
                tracing::warn!("Deletion of corpus '{}' refused: passphrase not accepted", corpus);
            }
            delete_corpus(ctx, &corpus, confirmed, state).await
        }
        "delete_document" => {
            let args: DeleteDocumentArgs = parse_args(tool_name, args)?;
            let corpus = corpus_or_current(&args.corpus_name, &*state)?;
            let confirmed = ctx.deletion_confirmed(args.confirm, args.passphrase.as_deref());
            if args.confirm && !confirmed {
                tracing::warn!(
                    "Deletion of document {} from '{}' refused: passphrase not accepted",
                    args.document_id,
                    corpus
                );
            }
            delete_document(ctx, &corpus, &args.document_id, confirmed, state).await
        }
        _ => ToolResult::error(format!("Unknown tool: {}", tool_name)),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::memory::{BackendCall, InMemoryRagBackend};
    use crate::session::{SessionState, CURRENT_CORPUS_KEY};
    use serde_json::json;

    fn setup(secret: Option<&str>) -> (Arc<InMemoryRagBackend>, ToolContext) {
        let backend = Arc::new(InMemoryRagBackend::new("demo", "us-central1"));
        backend.seed_corpus("1", "Math");
        let ctx = ToolContext::for_backend(backend.clone(), "demo")
            .with_deletion_secret(DeletionSecret::new(secret.map(str::to_string)));
        (backend, ctx)
    }

    #[test]
    fn catalogue_lists_seven_tools_with_schemas() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "rag_query",
                "list_corpora",
                "create_corpus",
                "add_data",
                "get_corpus_info",
                "delete_corpus",
                "delete_document"
            ]
        );
        let delete = &defs[5].parameters;
        assert!(delete["properties"].get("passphrase").is_some());
        assert!(delete["properties"].get("confirm").is_some());
    }

    #[tokio::test]
    async fn empty_corpus_name_uses_current_corpus() {
        let (_backend, ctx) = setup(None);
        let mut state = SessionState::new();
        state.set(CURRENT_CORPUS_KEY, json!("Math"));

        let result = execute_tool(&ctx, "get_corpus_info", &json!({"corpus_name": ""}), &mut state).await;
        assert!(result.is_success());
        assert_eq!(result.field("corpus_name"), Some(&json!("Math")));
    }

    #[tokio::test]
    async fn missing_current_corpus_is_reported_without_backend_call() {
        let (backend, ctx) = setup(None);
        let mut state = SessionState::new();

        let result = execute_tool(&ctx, "rag_query", &json!({"query": "x"}), &mut state).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.starts_with("No corpus specified"));
        assert_eq!(backend.calls(BackendCall::ListCorpora), 0);
    }

    #[tokio::test]
    async fn wrong_passphrase_blocks_corpus_deletion() {
        let (backend, ctx) = setup(Some("open sesame"));
        let mut state = SessionState::new();

        let result = execute_tool(
            &ctx,
            "delete_corpus",
            &json!({"corpus_name": "Math", "confirm": true, "passphrase": "guess"}),
            &mut state,
        )
        .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.contains("without confirmation"));
        assert!(!result.to_value().to_string().contains("open sesame"));
        assert_eq!(backend.calls(BackendCall::DeleteCorpus), 0);

        let result = execute_tool(
            &ctx,
            "delete_corpus",
            &json!({"corpus_name": "Math", "confirm": true, "passphrase": "open sesame"}),
            &mut state,
        )
        .await;
        assert!(result.is_success());
        assert_eq!(backend.calls(BackendCall::DeleteCorpus), 1);
    }

    #[tokio::test]
    async fn unconfigured_secret_refuses_all_deletions() {
        let (backend, ctx) = setup(None);
        let mut state = SessionState::new();

        let result = execute_tool(
            &ctx,
            "delete_document",
            &json!({"corpus_name": "Math", "document_id": "1", "confirm": true, "passphrase": ""}),
            &mut state,
        )
        .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(backend.calls(BackendCall::DeleteFile), 0);
    }

    #[tokio::test]
    async fn missing_corpus_is_reported_before_document_confirmation() {
        let (backend, ctx) = setup(Some("open sesame"));
        let mut state = SessionState::new();

        let result = execute_tool(
            &ctx,
            "delete_document",
            &json!({"corpus_name": "Nowhere", "document_id": "9"}),
            &mut state,
        )
        .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.contains("does not exist"), "{}", result.message);
        assert_eq!(backend.calls(BackendCall::DeleteFile), 0);
    }

    #[tokio::test]
    async fn bad_arguments_and_unknown_tools_are_errors() {
        let (_backend, ctx) = setup(None);
        let mut state = SessionState::new();

        let result = execute_tool(&ctx, "add_data", &json!({"corpus_name": "Math", "paths": [1, 2]}), &mut state).await;
        assert!(result.message.starts_with("Invalid arguments for add_data"));

        let result = execute_tool(&ctx, "create_corpus", &json!({"corpus_name": "  "}), &mut state).await;
        assert_eq!(result.status, ToolStatus::Error);

        let result = execute_tool(&ctx, "drop_tables", &Value::Null, &mut state).await;
        assert_eq!(result.message, "Unknown tool: drop_tables");
    }
}
