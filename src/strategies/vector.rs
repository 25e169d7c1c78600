use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Indexer, Strategy, answered_using};
use crate::error::{IndexError, StrategyError};
use crate::models::{ContentChunk, StrategyResponse};
use crate::services::{EmbeddingProvider, SourceReferenceBuilder, VectorIndex};
use crate::utils::retry;

/// Embeds the question, asks a vector index for the nearest pages and
/// fetches their content from the wiki.
pub struct VectorStoreStrategy {
    name: &'static str,
    display_name: &'static str,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    builder: Arc<SourceReferenceBuilder>,
    k: usize,
    max_upsert_failures: usize,
}

impl VectorStoreStrategy {
    pub fn new(
        name: &'static str,
        display_name: &'static str,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        builder: Arc<SourceReferenceBuilder>,
    ) -> Self {
        Self {
            name,
            display_name,
            index,
            embedder,
            builder,
            k: 5,
            max_upsert_failures: 5,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, k: usize, max_upsert_failures: usize) -> Self {
        self.k = k;
        self.max_upsert_failures = max_upsert_failures;
        self
    }
}

/// Keep the first occurrence of each id.
fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[async_trait]
impl Strategy for VectorStoreStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    async fn respond(&self, question: &str) -> Result<StrategyResponse, StrategyError> {
        let vector = self.embedder.embed(question).await?;
        let ids = dedup_ids(self.index.query_nearest(&vector, self.k).await?);
        debug!(strategy = self.name, hits = ids.len(), "vector search");

        let sources = self.builder.build(&ids).await?;
        Ok(StrategyResponse::new(
            sources,
            answered_using(self.display_name),
            None,
        ))
    }
}

#[async_trait]
impl Indexer for VectorStoreStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn build_database(&self, chunks: &[ContentChunk]) -> Result<(), IndexError> {
        info!(indexer = self.name, backend = self.index.name(), "ensuring schema");
        self.index.ensure_schema().await?;

        info!(indexer = self.name, chunks = chunks.len(), "upserting chunks");
        let mut failures = 0;
        for chunk in chunks {
            match retry(|_| self.index.upsert(chunk)).await {
                Ok(()) => debug!(indexer = self.name, page_id = %chunk.document_id, "added page"),
                Err(e) => {
                    warn!(
                        indexer = self.name,
                        page_id = %chunk.document_id,
                        error = %e,
                        "failed to upsert chunk"
                    );
                    failures += 1;
                    if failures > self.max_upsert_failures {
                        return Err(IndexError::TooManyFailures { failures });
                    }
                }
            }
        }

        info!(indexer = self.name, failures, "done");
        Ok(())
    }
}
