use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Indexer, Strategy, answered_using};
use crate::error::{IndexError, StrategyError};
use crate::models::{ContentChunk, SourceMap, StrategyResponse};
use crate::services::{EmbeddingProvider, HybridIndex, push_within_budget};

pub const NAME: &str = "aiSearch";
pub const DISPLAY_NAME: &str = "Azure AI Search";

/// Vector plus semantic search against an index that already holds the page
/// content, so no second fetch from the wiki is needed.
pub struct HybridSearchStrategy {
    index: Arc<dyn HybridIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    budget: usize,
    k: usize,
    max_upsert_failures: usize,
}

impl HybridSearchStrategy {
    pub fn new(
        index: Arc<dyn HybridIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        budget: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            budget,
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

#[async_trait]
impl Strategy for HybridSearchStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn display_name(&self) -> &str {
        DISPLAY_NAME
    }

    async fn respond(&self, question: &str) -> Result<StrategyResponse, StrategyError> {
        let vector = self.embedder.embed(question).await?;
        let hits = self
            .index
            .query_nearest_with_content(question, &vector, self.k)
            .await?;
        debug!(strategy = NAME, hits = hits.len(), "hybrid search");

        let mut sources = SourceMap::new();
        for hit in &hits {
            let more = push_within_budget(
                &mut sources,
                self.budget,
                &hit.page_id,
                &hit.content,
                &hit.page_url,
                &hit.page_title,
            );
            if !more {
                break;
            }
        }

        Ok(StrategyResponse::new(
            sources,
            answered_using(DISPLAY_NAME),
            None,
        ))
    }
}

#[async_trait]
impl Indexer for HybridSearchStrategy {
    fn name(&self) -> &str {
        NAME
    }

    async fn build_database(&self, chunks: &[ContentChunk]) -> Result<(), IndexError> {
        info!(indexer = NAME, "ensuring index");
        self.index.ensure_schema().await?;

        if chunks.is_empty() {
            return Ok(());
        }

        let statuses = self.index.upload(chunks).await?;
        let mut failures = 0;
        for status in &statuses {
            if status.status {
                debug!(indexer = NAME, key = %status.key, code = status.status_code, "indexed");
            } else {
                failures += 1;
                warn!(
                    indexer = NAME,
                    key = %status.key,
                    code = status.status_code,
                    error = status.error_message.as_deref().unwrap_or(""),
                    "document rejected"
                );
            }
        }

        info!(indexer = NAME, uploaded = statuses.len(), failures, "done");
        if failures > self.max_upsert_failures {
            return Err(IndexError::TooManyFailures { failures });
        }
        Ok(())
    }
}
