//! Azure AI Search over REST: vector plus semantic ranking, with page
//! content stored in the index.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::VectorStoreError;
use crate::models::{AiSearchConfig, ContentChunk};
use crate::services::vector_store::check_dimension;

const VECTOR_ALGORITHM: &str = "vector-hnsw-400";
const VECTOR_PROFILE: &str = "vector-default";
const SEMANTIC_CONFIG: &str = "default";
const MAX_BATCH: usize = 1000;

/// A ranked result with its content inline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub page_id: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub content: String,
}

/// Outcome of indexing one document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub key: String,
    pub status: bool,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// An index that stores content next to vectors and answers with both.
#[async_trait]
pub trait HybridIndex: Send + Sync {
    fn name(&self) -> &str;

    async fn ensure_schema(&self) -> Result<(), VectorStoreError>;

    /// Merge-or-upload every chunk and report per-key results.
    async fn upload(&self, chunks: &[ContentChunk]) -> Result<Vec<UploadStatus>, VectorStoreError>;

    async fn query_nearest_with_content(
        &self,
        query: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, VectorStoreError>;
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    id: String,
    page_id: &'a str,
    page_title: &'a str,
    page_url: &'a str,
    content: &'a str,
    embedding: &'a [f32],
}

pub struct AzureAISearch {
    client: Client,
    endpoint: String,
    api_key: String,
    index: String,
    api_version: String,
    dimension: usize,
}

impl AzureAISearch {
    pub fn new(config: &AiSearchConfig, dimension: u32) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            index: config.index.clone(),
            api_version: config.api_version.clone(),
            dimension: dimension as usize,
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.endpoint, self.index, suffix, self.api_version
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        body: &Value,
    ) -> Result<Response, VectorStoreError> {
        let response = request
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::SearchError(format!(
                "status {}: {}",
                status, body
            )));
        }
        Ok(response)
    }
}

/// Document keys may only contain letters, digits, `_`, `-` and `=`.
fn document_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn index_definition(name: &str, dimension: usize) -> Value {
    json!({
        "name": name,
        "fields": [
            {"name": "id", "type": "Edm.String", "key": true, "retrievable": true},
            {"name": "pageId", "type": "Edm.String", "filterable": true, "retrievable": true},
            {"name": "pageTitle", "type": "Edm.String", "searchable": true, "retrievable": true, "analyzer": "en.microsoft"},
            {"name": "pageUrl", "type": "Edm.String", "retrievable": true},
            {"name": "content", "type": "Edm.String", "searchable": true, "retrievable": true, "analyzer": "en.microsoft"},
            {
                "name": "embedding",
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "retrievable": false,
                "dimensions": dimension,
                "vectorSearchProfile": VECTOR_PROFILE
            }
        ],
        "vectorSearch": {
            "algorithms": [{
                "name": VECTOR_ALGORITHM,
                "kind": "hnsw",
                "hnswParameters": {"metric": "cosine", "m": 4, "efConstruction": 400, "efSearch": 500}
            }],
            "profiles": [{"name": VECTOR_PROFILE, "algorithm": VECTOR_ALGORITHM}]
        },
        "semantic": {
            "defaultConfiguration": SEMANTIC_CONFIG,
            "configurations": [{
                "name": SEMANTIC_CONFIG,
                "prioritizedFields": {
                    "titleField": {"fieldName": "pageTitle"},
                    "prioritizedContentFields": [{"fieldName": "content"}],
                    "prioritizedKeywordsFields": [{"fieldName": "pageUrl"}]
                }
            }]
        }
    })
}

fn search_request(query: &str, vector: &[f32], k: usize) -> Value {
    json!({
        "search": query,
        "queryType": "semantic",
        "semanticConfiguration": SEMANTIC_CONFIG,
        "captions": "extractive|highlight-false",
        "vectorQueries": [{
            "kind": "vector",
            "vector": vector,
            "k": k,
            "fields": "embedding"
        }],
        "select": "pageId,pageTitle,pageUrl,content",
        "top": k
    })
}

#[async_trait]
impl HybridIndex for AzureAISearch {
    fn name(&self) -> &str {
        "ai_search"
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        let request = self.client.put(self.url(""));
        self.send(request, &index_definition(&self.index, self.dimension))
            .await
            .map_err(|e| VectorStoreError::SchemaError(e.to_string()))?;
        Ok(())
    }

    async fn upload(&self, chunks: &[ContentChunk]) -> Result<Vec<UploadStatus>, VectorStoreError> {
        let mut statuses = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(MAX_BATCH) {
            let mut actions = Vec::with_capacity(batch.len());
            for chunk in batch {
                check_dimension(self.dimension, chunk.vector.len())?;
                actions.push(IndexAction {
                    action: "mergeOrUpload",
                    id: document_key(&chunk.id),
                    page_id: &chunk.document_id,
                    page_title: &chunk.title,
                    page_url: &chunk.url,
                    content: &chunk.content,
                    embedding: &chunk.vector,
                });
            }

            let body = json!({ "value": actions });
            let response = self
                .send(self.client.post(self.url("/docs/index")), &body)
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
            let result: ValueList<UploadStatus> = response
                .json()
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
            statuses.extend(result.value);
        }

        Ok(statuses)
    }

    async fn query_nearest_with_content(
        &self,
        query: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        check_dimension(self.dimension, vector.len())?;

        let response = self
            .send(
                self.client.post(self.url("/docs/search")),
                &search_request(query, vector, k),
            )
            .await?;
        let result: ValueList<SearchHit> = response
            .json()
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(result.value.into_iter().take(k).collect())
    }
}
