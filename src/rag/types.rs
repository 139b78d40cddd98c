//! Records exchanged with the managed RAG backend.
//!
//! Optional fields mirror what the backend may omit; callers decide the
//! defaults when reshaping them for tool output.

use serde::{Deserialize, Serialize};

/// A corpus as returned by the backend listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    /// Canonical resource path, `projects/{p}/locations/{l}/ragCorpora/{id}`.
    pub name: String,
    pub display_name: String,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

/// A file inside a corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full resource path ending in `/ragFiles/{id}`.
    pub name: String,
    pub display_name: Option<String>,
    pub source_uri: Option<String>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

/// One retrieved context from a retrieval query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub source_uri: Option<String>,
    pub source_name: Option<String>,
    pub text: Option<String>,
    pub score: Option<f64>,
}

/// Publisher embedding model used when provisioning a corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingModelConfig {
    pub publisher_model: String,
}

/// Chunking and throughput settings sent with an import.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportConfig {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub max_embedding_requests_per_min: u32,
}

/// Retrieval parameters sent with a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: u32,
    pub vector_distance_threshold: f64,
}
