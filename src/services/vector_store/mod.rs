//! Vector index abstraction.
//!
//! Each backend stores one embedding per chunk, keyed by chunk id, and
//! answers nearest-neighbour queries with the page ids of the closest chunks.

mod mongo;
mod postgres;
mod qdrant;

pub use mongo::MongoIndex;
pub use postgres::PgVectorIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::ContentChunk;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Create the table, collection or index if it does not exist yet.
    /// Safe to call on every start.
    async fn ensure_schema(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace the embedding of one chunk.
    async fn upsert(&self, chunk: &ContentChunk) -> Result<(), VectorStoreError>;

    /// Page ids of the `k` nearest chunks, closest first.
    async fn query_nearest(&self, vector: &[f32], k: usize)
    -> Result<Vec<String>, VectorStoreError>;
}

/// Reject vectors whose length does not match the index.
pub fn check_dimension(expected: usize, actual: usize) -> Result<(), VectorStoreError> {
    if expected != actual {
        return Err(VectorStoreError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// In-memory index returning a fixed neighbour list.
    #[derive(Default)]
    pub struct MemoryIndex {
        pub neighbours: Vec<String>,
        pub fail_upsert_for: Vec<String>,
        pub fail_schema: bool,
        pub upserted: Mutex<Vec<String>>,
        pub schema_calls: Mutex<usize>,
        pub queries: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorIndex for MemoryIndex {
        fn name(&self) -> &str {
            "memory"
        }

        async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
            *self.schema_calls.lock().unwrap() += 1;
            if self.fail_schema {
                return Err(VectorStoreError::SchemaError("no permission".to_string()));
            }
            Ok(())
        }

        async fn upsert(&self, chunk: &ContentChunk) -> Result<(), VectorStoreError> {
            if self.fail_upsert_for.contains(&chunk.id) {
                return Err(VectorStoreError::UpsertError(format!("rejected {}", chunk.id)));
            }
            self.upserted.lock().unwrap().push(chunk.id.clone());
            Ok(())
        }

        async fn query_nearest(
            &self,
            _vector: &[f32],
            k: usize,
        ) -> Result<Vec<String>, VectorStoreError> {
            self.queries.lock().unwrap().push(k);
            Ok(self.neighbours.iter().take(k).cloned().collect())
        }
    }
}
