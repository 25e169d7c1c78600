//! Turning pages into embedded chunks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{ContentChunk, Document};
use crate::services::provider::EmbeddingProvider;
use crate::utils::retry;

/// Splits a document into one or more chunks, each with its embedding.
#[async_trait]
pub trait Chunker: Send + Sync {
    async fn chunk(&self, document: &Document) -> Result<Vec<ContentChunk>, IndexError>;
}

/// Embeds each page as a single chunk. Transient embedding failures are
/// retried with backoff.
pub struct WholePageChunker {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl WholePageChunker {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Chunker for WholePageChunker {
    async fn chunk(&self, document: &Document) -> Result<Vec<ContentChunk>, IndexError> {
        let text = document.embedding_text();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let vector = retry(|_| self.embedder.embed(&text)).await?;
        Ok(vec![ContentChunk::from_document(
            document,
            document.content.clone(),
            0,
            vector,
        )])
    }
}
