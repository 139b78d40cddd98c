use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::backend::RagBackend;
use super::sources::{drive_file_id, drive_view_url};
use super::types::{
    CorpusRecord, EmbeddingModelConfig, FileRecord, ImportConfig, RetrievalConfig,
    RetrievedContext,
};
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;

const PAGE_SIZE: u32 = 100;
const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const OPERATION_MAX_POLLS: u32 = 150;
const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

/// Where bearer tokens for the Vertex API come from.
enum TokenSource {
    Static(String),
    /// `gcloud auth print-access-token`, cached for a while.
    Gcloud(Mutex<Option<(String, Instant)>>),
}

impl TokenSource {
    async fn token(&self) -> Result<String, ApiError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Gcloud(cache) => {
                let mut cached = cache.lock().await;
                if let Some((token, fetched_at)) = cached.as_ref() {
                    if fetched_at.elapsed() < GCLOUD_TOKEN_TTL {
                        return Ok(token.clone());
                    }
                }
                let output = tokio::process::Command::new("gcloud")
                    .args(["auth", "print-access-token"])
                    .output()
                    .await
                    .map_err(|e| ApiError::Upstream(format!("Failed to run gcloud: {}", e)))?;
                if !output.status.success() {
                    return Err(ApiError::Upstream(format!(
                        "gcloud auth print-access-token exited with {}",
                        output.status
                    )));
                }
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if token.is_empty() {
                    return Err(ApiError::Upstream(
                        "gcloud returned an empty access token".to_string(),
                    ));
                }
                *cached = Some((token.clone(), Instant::now()));
                Ok(token)
            }
        }
    }
}

/// `RagBackend` bound to the Vertex AI RAG Engine REST API.
pub struct VertexRagBackend {
    base_url: String,
    project_id: String,
    location: String,
    client: Client,
    tokens: TokenSource,
}

impl VertexRagBackend {
    pub fn new(settings: &RagSettings) -> Result<Self, ApiError> {
        if settings.project_id.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "rag.project_id (or GOOGLE_CLOUD_PROJECT) is required for the vertex backend"
                    .to_string(),
            ));
        }
        let base_url = format!("https://{}-aiplatform.googleapis.com/v1", settings.location);
        let tokens = match settings.access_token.as_deref() {
            Some(token) => TokenSource::Static(token.to_string()),
            None => TokenSource::Gcloud(Mutex::new(None)),
        };
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url,
            project_id: settings.project_id.clone(),
            location: settings.location.clone(),
            client,
            tokens,
        })
    }

    fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    async fn send(&self, request: RequestBuilder, call: &str) -> Result<Value, ApiError> {
        let token = self.tokens.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("{} request failed: {}", call, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "{} failed ({}): {}",
                call,
                status,
                body.trim()
            )));
        }

        let text = response.text().await.map_err(ApiError::upstream)?;
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Upstream(format!("{} returned invalid JSON: {}", call, e)))
    }

    /// Follows `nextPageToken` and gathers the array under `field`.
    async fn list_all(&self, url: &str, field: &str, call: &str) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut page_url = format!("{}?pageSize={}", url, PAGE_SIZE);
            if let Some(token) = page_token.as_deref() {
                page_url.push_str("&pageToken=");
                page_url.push_str(&urlencoding::encode(token));
            }
            let payload = self.send(self.client.get(&page_url), call).await?;
            if let Some(page) = payload.get(field).and_then(|v| v.as_array()) {
                items.extend(page.iter().cloned());
            }
            page_token = payload
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                return Ok(items);
            }
        }
    }

    /// Polls a long-running operation until done and returns its `response`.
    async fn wait_operation(&self, mut operation: Value, call: &str) -> Result<Value, ApiError> {
        for _ in 0..OPERATION_MAX_POLLS {
            if let Some(result) = operation_outcome(&operation, call)? {
                return Ok(result);
            }
            let name = operation
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ApiError::Upstream(format!("{} returned an operation without a name", call))
                })?
                .to_string();
            tokio::time::sleep(OPERATION_POLL_INTERVAL).await;
            let url = format!("{}/{}", self.base_url, name);
            operation = self.send(self.client.get(&url), call).await?;
        }
        Err(ApiError::Upstream(format!(
            "{} did not finish after {} polls",
            call, OPERATION_MAX_POLLS
        )))
    }
}

#[async_trait]
impl RagBackend for VertexRagBackend {
    async fn list_corpora(&self) -> Result<Vec<CorpusRecord>, ApiError> {
        let url = format!("{}/{}/ragCorpora", self.base_url, self.parent());
        let items = self.list_all(&url, "ragCorpora", "list corpora").await?;
        Ok(items.iter().filter_map(parse_corpus).collect())
    }

    async fn create_corpus(
        &self,
        display_name: &str,
        embedding: &EmbeddingModelConfig,
    ) -> Result<CorpusRecord, ApiError> {
        let url = format!("{}/{}/ragCorpora", self.base_url, self.parent());
        let body = create_corpus_body(&self.parent(), display_name, embedding);
        let operation = self
            .send(self.client.post(&url).json(&body), "create corpus")
            .await?;
        let created = self.wait_operation(operation, "create corpus").await?;
        parse_corpus(&created).ok_or_else(|| {
            ApiError::Upstream("create corpus returned no corpus resource".to_string())
        })
    }

    async fn delete_corpus(&self, corpus_path: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url, corpus_path);
        self.send(self.client.delete(&url), "delete corpus").await?;
        Ok(())
    }

    async fn list_files(&self, corpus_path: &str) -> Result<Vec<FileRecord>, ApiError> {
        let url = format!("{}/{}/ragFiles", self.base_url, corpus_path);
        let items = self.list_all(&url, "ragFiles", "list files").await?;
        Ok(items.iter().filter_map(parse_file).collect())
    }

    async fn delete_file(&self, file_path: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url, file_path);
        self.send(self.client.delete(&url), "delete file").await?;
        Ok(())
    }

    async fn import_files(
        &self,
        corpus_path: &str,
        source_uris: &[String],
        config: &ImportConfig,
    ) -> Result<u64, ApiError> {
        let url = format!("{}/{}/ragFiles:import", self.base_url, corpus_path);
        let mut imported = 0;
        for body in import_files_bodies(source_uris, config)? {
            let operation = self
                .send(self.client.post(&url).json(&body), "import files")
                .await?;
            let result = self.wait_operation(operation, "import files").await?;
            imported += imported_count(&result);
        }
        Ok(imported)
    }

    async fn retrieval_query(
        &self,
        corpus_paths: &[String],
        text: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RetrievedContext>, ApiError> {
        let url = format!("{}/{}:retrieveContexts", self.base_url, self.parent());
        let body = retrieval_body(corpus_paths, text, config);
        let payload = self
            .send(self.client.post(&url).json(&body), "retrieval query")
            .await?;
        Ok(parse_contexts(&payload))
    }
}

fn create_corpus_body(parent: &str, display_name: &str, embedding: &EmbeddingModelConfig) -> Value {
    json!({
        "displayName": display_name,
        "vectorDbConfig": {
            "ragEmbeddingModelConfig": {
                "vertexPredictionEndpoint": {
                    "endpoint": format!("{}/{}", parent, embedding.publisher_model)
                }
            }
        }
    })
}

/// One `ragFiles:import` body per source kind; the API accepts a single
/// import source per request. GCS first, then Drive.
fn import_files_bodies(
    source_uris: &[String],
    config: &ImportConfig,
) -> Result<Vec<Value>, ApiError> {
    let mut gcs_uris = Vec::new();
    let mut drive_ids = Vec::new();
    for uri in source_uris {
        if uri.starts_with("gs://") {
            gcs_uris.push(uri.clone());
        } else if let Some(id) = drive_file_id(uri) {
            drive_ids.push(json!({
                "resourceId": id,
                "resourceType": "RESOURCE_TYPE_FILE"
            }));
        } else {
            return Err(ApiError::BadRequest(format!(
                "Unsupported source for import: {}",
                uri
            )));
        }
    }

    let mut bodies = Vec::with_capacity(2);
    if !gcs_uris.is_empty() {
        bodies.push(import_body(config, "gcsSource", json!({ "uris": gcs_uris })));
    }
    if !drive_ids.is_empty() {
        bodies.push(import_body(
            config,
            "googleDriveSource",
            json!({ "resourceIds": drive_ids }),
        ));
    }
    Ok(bodies)
}

fn import_body(config: &ImportConfig, source_key: &str, source: Value) -> Value {
    let mut import_config = json!({
        "ragFileTransformationConfig": {
            "ragFileChunkingConfig": {
                "fixedLengthChunking": {
                    "chunkSize": config.chunk_size,
                    "chunkOverlap": config.chunk_overlap
                }
            }
        },
        "maxEmbeddingRequestsPerMin": config.max_embedding_requests_per_min
    });
    if let Some(obj) = import_config.as_object_mut() {
        obj.insert(source_key.to_string(), source);
    }
    json!({ "importRagFilesConfig": import_config })
}

fn retrieval_body(corpus_paths: &[String], text: &str, config: &RetrievalConfig) -> Value {
    let resources: Vec<Value> = corpus_paths
        .iter()
        .map(|path| json!({ "ragCorpus": path }))
        .collect();
    json!({
        "vertexRagStore": { "ragResources": resources },
        "query": {
            "text": text,
            "ragRetrievalConfig": {
                "topK": config.top_k,
                "filter": { "vectorDistanceThreshold": config.vector_distance_threshold }
            }
        }
    })
}

/// `Some(response)` once the operation is done, `None` while it is running.
fn operation_outcome(operation: &Value, call: &str) -> Result<Option<Value>, ApiError> {
    if !operation.get("done").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Ok(None);
    }
    if let Some(error) = operation.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("operation failed");
        return Err(ApiError::Upstream(format!("{} failed: {}", call, message)));
    }
    Ok(Some(operation.get("response").cloned().unwrap_or(Value::Null)))
}

fn imported_count(result: &Value) -> u64 {
    // int64 fields arrive as JSON strings
    match result.get("importedRagFilesCount") {
        Some(Value::String(text)) => text.parse().unwrap_or(0),
        Some(value) => value.as_u64().unwrap_or(0),
        None => 0,
    }
}

fn parse_corpus(value: &Value) -> Option<CorpusRecord> {
    let name = value.get("name").and_then(|v| v.as_str())?.to_string();
    Some(CorpusRecord {
        name,
        display_name: str_field(value, "displayName").unwrap_or_default(),
        create_time: str_field(value, "createTime"),
        update_time: str_field(value, "updateTime"),
    })
}

fn parse_file(value: &Value) -> Option<FileRecord> {
    let name = value.get("name").and_then(|v| v.as_str())?.to_string();
    let source_uri = str_field(value, "sourceUri")
        .or_else(|| {
            value
                .get("gcsSource")
                .and_then(|v| v.get("uris"))
                .and_then(|v| v.as_array())
                .and_then(|uris| uris.first())
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .or_else(|| {
            value
                .get("googleDriveSource")
                .and_then(|v| v.get("resourceIds"))
                .and_then(|v| v.as_array())
                .and_then(|ids| ids.first())
                .and_then(|v| v.get("resourceId"))
                .and_then(|v| v.as_str())
                .map(drive_view_url)
        });
    Some(FileRecord {
        name,
        display_name: str_field(value, "displayName"),
        source_uri,
        create_time: str_field(value, "createTime"),
        update_time: str_field(value, "updateTime"),
    })
}

fn parse_contexts(payload: &Value) -> Vec<RetrievedContext> {
    payload
        .get("contexts")
        .and_then(|v| v.get("contexts"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| RetrievedContext {
                    source_uri: str_field(item, "sourceUri"),
                    source_name: str_field(item, "sourceDisplayName"),
                    text: str_field(item, "text"),
                    score: item
                        .get("score")
                        .or_else(|| item.get("distance"))
                        .and_then(|v| v.as_f64()),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
