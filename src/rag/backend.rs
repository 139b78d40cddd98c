//! Capability interface over the managed RAG service.
//!
//! Production binds it to Vertex AI (`VertexRagBackend`); tests and offline
//! runs bind it to `InMemoryRagBackend`. Every call is a single request as far
//! as callers are concerned; no retries happen behind this interface.

use async_trait::async_trait;

use super::types::{
    CorpusRecord, EmbeddingModelConfig, FileRecord, ImportConfig, RetrievalConfig,
    RetrievedContext,
};
use crate::core::errors::ApiError;

#[async_trait]
pub trait RagBackend: Send + Sync {
    /// Enumerate every corpus visible to the configured project/location.
    async fn list_corpora(&self) -> Result<Vec<CorpusRecord>, ApiError>;

    /// Provision a corpus and return it with its backend-assigned name.
    async fn create_corpus(
        &self,
        display_name: &str,
        embedding: &EmbeddingModelConfig,
    ) -> Result<CorpusRecord, ApiError>;

    /// Remove a corpus by canonical path.
    async fn delete_corpus(&self, corpus_path: &str) -> Result<(), ApiError>;

    /// Enumerate the files of a corpus.
    async fn list_files(&self, corpus_path: &str) -> Result<Vec<FileRecord>, ApiError>;

    /// Remove one file, addressed as `{corpus_path}/ragFiles/{id}`.
    async fn delete_file(&self, file_path: &str) -> Result<(), ApiError>;

    /// Ingest source URIs into a corpus; returns the imported file count.
    async fn import_files(
        &self,
        corpus_path: &str,
        source_uris: &[String],
        config: &ImportConfig,
    ) -> Result<u64, ApiError>;

    /// Semantic search across the given corpora.
    async fn retrieval_query(
        &self,
        corpus_paths: &[String],
        text: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RetrievedContext>, ApiError>;
}
