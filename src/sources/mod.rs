//! Wiki content providers.
//!
//! A provider lists pages, fetches a page by id and runs a keyword search.
//! Confluence is used when configured; otherwise pages are served from a local
//! folder of HTML files.

mod confluence;
mod local;

pub use confluence::ConfluenceClient;
pub use local::LocalWiki;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ContentError;
use crate::models::Document;

/// Read access to the wiki.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Ids of every page in the wiki.
    async fn list_page_ids(&self) -> Result<Vec<String>, ContentError>;

    /// Fetch a single page. Fails with [`ContentError::NotFound`] if absent.
    async fn get_document(&self, id: &str) -> Result<Document, ContentError>;

    /// Ids of pages matching `query`, best match first.
    async fn keyword_search(&self, query: &str, limit: usize)
    -> Result<Vec<String>, ContentError>;

    /// Fetch every page. Pages that fail to load are skipped.
    async fn list_all_documents(&self) -> Result<Vec<Document>, ContentError> {
        let ids = self.list_page_ids().await?;
        let mut documents = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.get_document(id).await {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!(page_id = %id, error = %e, "skipping page"),
            }
        }

        debug!(
            listed = ids.len(),
            loaded = documents.len(),
            "loaded wiki pages"
        );
        Ok(documents)
    }
}
