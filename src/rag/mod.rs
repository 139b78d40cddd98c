//! Managed RAG service access.
//!
//! - `RagBackend`: capability trait over the corpus/file/retrieval calls
//! - `VertexRagBackend` / `InMemoryRagBackend`: its two bindings
//! - `resolver` and `existence`: corpus identifier resolution and the
//!   session-scoped existence cache built on top of it

mod backend;
pub mod existence;
pub mod memory;
pub mod resolver;
pub mod sources;
mod types;
mod vertex;

use std::sync::Arc;

pub use backend::RagBackend;
pub use memory::InMemoryRagBackend;
pub use types::{
    CorpusRecord, EmbeddingModelConfig, FileRecord, ImportConfig, RetrievalConfig,
    RetrievedContext,
};
pub use vertex::VertexRagBackend;

use crate::core::config::{BackendKind, RagSettings};
use crate::core::errors::ApiError;

/// Builds the backend selected by `rag.backend`.
pub fn build_backend(settings: &RagSettings) -> Result<Arc<dyn RagBackend>, ApiError> {
    match settings.backend {
        BackendKind::Vertex => Ok(Arc::new(VertexRagBackend::new(settings)?)),
        BackendKind::Memory => {
            tracing::warn!("Using the in-memory RAG backend; corpora are not persisted");
            Ok(Arc::new(InMemoryRagBackend::new(
                settings.project_id.as_str(),
                settings.location.as_str(),
            )))
        }
    }
}
