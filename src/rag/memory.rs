//! In-process `RagBackend`.
//!
//! Keeps corpora and files in memory, counts every call and can be told to
//! fail specific calls. Used by the test suite and by the `memory` backend
//! setting for offline runs; retrieval only returns contexts seeded with
//! [`InMemoryRagBackend::seed_contexts`].

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::backend::RagBackend;
use super::types::{
    CorpusRecord, EmbeddingModelConfig, FileRecord, ImportConfig, RetrievalConfig,
    RetrievedContext,
};
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCall {
    ListCorpora,
    CreateCorpus,
    DeleteCorpus,
    ListFiles,
    DeleteFile,
    ImportFiles,
    RetrievalQuery,
}

/// One recorded `import_files` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub corpus_path: String,
    pub source_uris: Vec<String>,
    pub config: ImportConfig,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    corpora: Vec<CorpusRecord>,
    files: HashMap<String, Vec<FileRecord>>,
    contexts: HashMap<String, Vec<RetrievedContext>>,
    calls: HashMap<BackendCall, usize>,
    failing: HashSet<BackendCall>,
    imports: Vec<ImportRecord>,
    deleted_files: Vec<String>,
}

pub struct InMemoryRagBackend {
    project_id: String,
    location: String,
    inner: Mutex<Inner>,
}

impl InMemoryRagBackend {
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Canonical path this backend assigns to a corpus id.
    pub fn corpus_path(&self, corpus_id: &str) -> String {
        format!(
            "projects/{}/locations/{}/ragCorpora/{}",
            self.project_id, self.location, corpus_id
        )
    }

    /// Registers an existing corpus without counting a backend call.
    pub fn seed_corpus(&self, corpus_id: &str, display_name: &str) -> String {
        let name = self.corpus_path(corpus_id);
        let now = Utc::now().to_rfc3339();
        if let Ok(mut inner) = self.inner.lock() {
            inner.corpora.push(CorpusRecord {
                name: name.clone(),
                display_name: display_name.to_string(),
                create_time: Some(now.clone()),
                update_time: Some(now),
            });
        }
        name
    }

    pub fn seed_file(&self, corpus_path: &str, file: FileRecord) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .files
                .entry(corpus_path.to_string())
                .or_default()
                .push(file);
        }
    }

    pub fn seed_contexts(&self, corpus_path: &str, contexts: Vec<RetrievedContext>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.contexts.insert(corpus_path.to_string(), contexts);
        }
    }

    /// Makes every subsequent `call` fail with an upstream error.
    pub fn fail_on(&self, call: BackendCall) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.insert(call);
        }
    }

    pub fn recover(&self, call: BackendCall) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.remove(&call);
        }
    }

    pub fn calls(&self, call: BackendCall) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.calls.get(&call).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn imports(&self) -> Vec<ImportRecord> {
        self.inner
            .lock()
            .map(|inner| inner.imports.clone())
            .unwrap_or_default()
    }

    pub fn deleted_files(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.deleted_files.clone())
            .unwrap_or_default()
    }

    pub fn corpora(&self) -> Vec<CorpusRecord> {
        self.inner
            .lock()
            .map(|inner| inner.corpora.clone())
            .unwrap_or_default()
    }

    fn enter(&self, call: BackendCall) -> Result<std::sync::MutexGuard<'_, Inner>, ApiError> {
        let mut inner = self.inner.lock().map_err(ApiError::internal)?;
        *inner.calls.entry(call).or_insert(0) += 1;
        if inner.failing.contains(&call) {
            return Err(ApiError::Upstream(format!("{:?} unavailable", call)));
        }
        Ok(inner)
    }
}

#[async_trait]
impl RagBackend for InMemoryRagBackend {
    async fn list_corpora(&self) -> Result<Vec<CorpusRecord>, ApiError> {
        let inner = self.enter(BackendCall::ListCorpora)?;
        Ok(inner.corpora.clone())
    }

    async fn create_corpus(
        &self,
        display_name: &str,
        _embedding: &EmbeddingModelConfig,
    ) -> Result<CorpusRecord, ApiError> {
        let mut inner = self.enter(BackendCall::CreateCorpus)?;
        inner.next_id += 1;
        let name = format!(
            "projects/{}/locations/{}/ragCorpora/{}",
            self.project_id,
            self.location,
            1_000_000 + inner.next_id
        );
        let now = Utc::now().to_rfc3339();
        let record = CorpusRecord {
            name,
            display_name: display_name.to_string(),
            create_time: Some(now.clone()),
            update_time: Some(now),
        };
        inner.corpora.push(record.clone());
        Ok(record)
    }

    async fn delete_corpus(&self, corpus_path: &str) -> Result<(), ApiError> {
        let mut inner = self.enter(BackendCall::DeleteCorpus)?;
        let before = inner.corpora.len();
        inner.corpora.retain(|corpus| corpus.name != corpus_path);
        if inner.corpora.len() == before {
            return Err(ApiError::NotFound(format!("{} not found", corpus_path)));
        }
        inner.files.remove(corpus_path);
        inner.contexts.remove(corpus_path);
        Ok(())
    }

    async fn list_files(&self, corpus_path: &str) -> Result<Vec<FileRecord>, ApiError> {
        let inner = self.enter(BackendCall::ListFiles)?;
        Ok(inner.files.get(corpus_path).cloned().unwrap_or_default())
    }

    async fn delete_file(&self, file_path: &str) -> Result<(), ApiError> {
        let mut inner = self.enter(BackendCall::DeleteFile)?;
        let Some((corpus_path, _)) = file_path.split_once("/ragFiles/") else {
            return Err(ApiError::BadRequest(format!("{} is not a file path", file_path)));
        };
        let corpus_path = corpus_path.to_string();
        let files = inner.files.entry(corpus_path).or_default();
        let before = files.len();
        files.retain(|file| file.name != file_path);
        if files.len() == before {
            return Err(ApiError::NotFound(format!("{} not found", file_path)));
        }
        inner.deleted_files.push(file_path.to_string());
        Ok(())
    }

    async fn import_files(
        &self,
        corpus_path: &str,
        source_uris: &[String],
        config: &ImportConfig,
    ) -> Result<u64, ApiError> {
        let mut inner = self.enter(BackendCall::ImportFiles)?;
        if !inner.corpora.iter().any(|corpus| corpus.name == corpus_path) {
            return Err(ApiError::NotFound(format!("{} not found", corpus_path)));
        }
        inner.imports.push(ImportRecord {
            corpus_path: corpus_path.to_string(),
            source_uris: source_uris.to_vec(),
            config: *config,
        });

        let now = Utc::now().to_rfc3339();
        for uri in source_uris {
            inner.next_id += 1;
            let file = FileRecord {
                name: format!("{}/ragFiles/{}", corpus_path, 5_000_000 + inner.next_id),
                display_name: uri.rsplit('/').find(|s| !s.is_empty()).map(str::to_string),
                source_uri: Some(uri.clone()),
                create_time: Some(now.clone()),
                update_time: Some(now.clone()),
            };
            inner
                .files
                .entry(corpus_path.to_string())
                .or_default()
                .push(file);
        }
        Ok(source_uris.len() as u64)
    }

    async fn retrieval_query(
        &self,
        corpus_paths: &[String],
        _text: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RetrievedContext>, ApiError> {
        let inner = self.enter(BackendCall::RetrievalQuery)?;
        let mut contexts: Vec<RetrievedContext> = corpus_paths
            .iter()
            .filter_map(|path| inner.contexts.get(path))
            .flatten()
            .filter(|ctx| {
                ctx.score
                    .map(|distance| distance <= config.vector_distance_threshold)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        contexts.truncate(config.top_k as usize);
        Ok(contexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding() -> EmbeddingModelConfig {
        EmbeddingModelConfig {
            publisher_model: "publishers/google/models/text-embedding-005".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_list_counts_calls() {
        let backend = InMemoryRagBackend::new("p", "l");
        let created = backend
            .create_corpus("Math", &embedding())
            .await
            .expect("create");
        assert!(created.name.starts_with("projects/p/locations/l/ragCorpora/"));

        let listed = backend.list_corpora().await.expect("list");
        assert_eq!(listed, vec![created]);
        assert_eq!(backend.calls(BackendCall::CreateCorpus), 1);
        assert_eq!(backend.calls(BackendCall::ListCorpora), 1);
    }

    #[tokio::test]
    async fn failing_calls_are_still_counted() {
        let backend = InMemoryRagBackend::new("p", "l");
        backend.fail_on(BackendCall::ListCorpora);
        assert!(backend.list_corpora().await.is_err());
        assert_eq!(backend.calls(BackendCall::ListCorpora), 1);

        backend.recover(BackendCall::ListCorpora);
        assert!(backend.list_corpora().await.is_ok());
    }

    #[tokio::test]
    async fn retrieval_applies_threshold_and_top_k() {
        let backend = InMemoryRagBackend::new("p", "l");
        let path = backend.seed_corpus("1", "Math");
        let ctx = |score: f64| RetrievedContext {
            source_uri: Some("gs://b/f.pdf".to_string()),
            source_name: Some("f.pdf".to_string()),
            text: Some("text".to_string()),
            score: Some(score),
        };
        backend.seed_contexts(&path, vec![ctx(0.1), ctx(0.9), ctx(0.2), ctx(0.3)]);

        let config = RetrievalConfig {
            top_k: 2,
            vector_distance_threshold: 0.5,
        };
        let found = backend
            .retrieval_query(&[path], "q", &config)
            .await
            .expect("query");
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.score.unwrap_or_default() <= 0.5));
    }
}
