use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};

use super::{VectorIndex, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{ContentChunk, QdrantConfig};

const PAGE_ID: &str = "page_id";
const CHUNK_ID: &str = "chunk_id";

/// Qdrant collection with one point per chunk.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    pub fn new(config: &QdrantConfig, dimension: u32) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: dimension as usize,
        })
    }
}

fn chunk_payload(chunk: &ContentChunk) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert(PAGE_ID.to_string(), chunk.document_id.clone().into());
    payload.insert(CHUNK_ID.to_string(), chunk.id.clone().into());
    payload
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;
        if exists {
            return Ok(());
        }

        let create = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
        );
        self.client
            .create_collection(create)
            .await
            .map_err(|e| VectorStoreError::SchemaError(e.to_string()))?;
        Ok(())
    }

    async fn upsert(&self, chunk: &ContentChunk) -> Result<(), VectorStoreError> {
        check_dimension(self.dimension, chunk.vector.len())?;

        let point = PointStruct::new(chunk.point_uuid(), chunk.vector.clone(), chunk_payload(chunk));
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
        Ok(())
    }

    async fn query_nearest(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<String>, VectorStoreError> {
        check_dimension(self.dimension, vector.len())?;

        let search = SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
            .with_payload(true);
        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| payload_string(&point.payload, PAGE_ID))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    #[test]
    fn test_chunk_payload_round_trips_page_id() {
        let doc = Document::new("42", "Title", "body", "/42");
        let chunk = ContentChunk::from_document(&doc, "body".to_string(), 1, vec![0.0; 3]);

        let payload = chunk_payload(&chunk);
        assert_eq!(payload_string(&payload, PAGE_ID).as_deref(), Some("42"));
        assert_eq!(payload_string(&payload, CHUNK_ID).as_deref(), Some("42:1"));
        assert_eq!(payload_string(&payload, "missing"), None);
    }

    #[test]
    fn test_new_builds_client_without_connecting() {
        let config = QdrantConfig {
            url: "http://localhost:6334".to_string(),
            ..Default::default()
        };
        let index = QdrantIndex::new(&config, 1536).unwrap();
        assert_eq!(index.collection, "wiki");
        assert_eq!(index.dimension, 1536);
    }
}
