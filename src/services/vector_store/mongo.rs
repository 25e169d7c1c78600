use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document as BsonDocument, doc};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection, Database};

use super::{VectorIndex, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{ContentChunk, MongoConfig};

const COLLECTION: &str = "vectors";
const INDEX_NAME: &str = "vectorSearchIndex";
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Cosmos DB for MongoDB vCore collection with a `cosmosSearch` vector index.
pub struct MongoIndex {
    database: Database,
    vectors: Collection<BsonDocument>,
    dimension: usize,
}

impl MongoIndex {
    pub async fn connect(config: &MongoConfig, dimension: u32) -> Result<Self, VectorStoreError> {
        let client = Client::with_uri_str(&config.connection_string)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;
        let database = client.database(config.database_name());
        let vectors = database.collection::<BsonDocument>(COLLECTION);

        Ok(Self {
            database,
            vectors,
            dimension: dimension as usize,
        })
    }

    async fn index_exists(&self) -> Result<bool, VectorStoreError> {
        match self.vectors.list_index_names().await {
            Ok(names) => Ok(names.iter().any(|n| n.as_str() == INDEX_NAME)),
            Err(e) => match *e.kind {
                ErrorKind::Command(ref c) if c.code == NAMESPACE_NOT_FOUND => Ok(false),
                _ => Err(VectorStoreError::ConnectionError(e.to_string())),
            },
        }
    }
}

fn to_bson_vector(vector: &[f32]) -> Vec<f64> {
    vector.iter().map(|v| f64::from(*v)).collect()
}

fn create_index_command(dimension: usize) -> BsonDocument {
    let dimensions = dimension as i64;
    doc! {
        "createIndexes": COLLECTION,
        "indexes": [{
            "name": INDEX_NAME,
            "key": { "vector": "cosmosSearch" },
            "cosmosSearchOptions": {
                "kind": "vector-ivf",
                "numLists": 5,
                "similarity": "COS",
                "dimensions": dimensions,
            },
        }],
    }
}

fn search_pipeline(vector: &[f32], k: usize) -> Vec<BsonDocument> {
    let k = k as i64;
    vec![
        doc! {
            "$search": {
                "cosmosSearch": {
                    "vector": to_bson_vector(vector),
                    "path": "vector",
                    "k": k,
                },
                "returnStoredSource": true,
            }
        },
        doc! {
            "$project": {
                "similarityScore": { "$meta": "searchScore" },
                "pageId": 1,
            }
        },
    ]
}

fn page_document(chunk: &ContentChunk) -> BsonDocument {
    doc! {
        "_id": chunk.id.as_str(),
        "pageId": chunk.document_id.as_str(),
        "vector": to_bson_vector(&chunk.vector),
    }
}

/// Servers report `ok` as a double or an integer.
fn command_ok(response: &BsonDocument) -> bool {
    match response.get("ok") {
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        _ => false,
    }
}

#[async_trait]
impl VectorIndex for MongoIndex {
    fn name(&self) -> &str {
        "mongo"
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        if self.index_exists().await? {
            return Ok(());
        }

        let response = self
            .database
            .run_command(create_index_command(self.dimension))
            .await
            .map_err(|e| VectorStoreError::SchemaError(e.to_string()))?;

        if !command_ok(&response) {
            return Err(VectorStoreError::SchemaError(format!(
                "createIndexes failed with response: {}",
                response
            )));
        }
        Ok(())
    }

    async fn upsert(&self, chunk: &ContentChunk) -> Result<(), VectorStoreError> {
        check_dimension(self.dimension, chunk.vector.len())?;

        self.vectors
            .replace_one(doc! { "_id": chunk.id.as_str() }, page_document(chunk))
            .upsert(true)
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

        let mut cursor = self
            .vectors
            .aggregate(search_pipeline(vector, k))
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let mut ids = Vec::new();
        while let Some(result) = cursor
            .try_next()
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?
        {
            if let Ok(page_id) = result.get_str("pageId") {
                ids.push(page_id.to_string());
            }
        }
        Ok(ids)
    }
}
