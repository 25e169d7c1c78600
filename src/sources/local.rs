//! Folder of HTML pages standing in for a wiki.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ContentError;
use crate::models::Document;
use crate::sources::ContentProvider;
use crate::utils::strip_html;

/// Every `*.html` file in `root` is a page whose id is the file stem.
#[derive(Debug)]
pub struct LocalWiki {
    pages: BTreeMap<String, Document>,
}

impl LocalWiki {
    /// Read all pages from `root`. A missing folder yields an empty wiki.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let root = root.into();
        let mut pages = BTreeMap::new();

        if !root.is_dir() {
            warn!(folder = %root.display(), "local wiki folder not found");
            return Ok(Self { pages });
        }

        let pattern = format!(
            "{}/*.html",
            glob::Pattern::escape(&root.to_string_lossy())
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| ContentError::InvalidResponse(e.to_string()))?;

        let folder_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "unreadable wiki entry");
                    continue;
                }
            };
            let doc = match read_page(&path, &folder_name) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(page = %path.display(), error = %e, "skipping unreadable page");
                    continue;
                }
            };
            pages.insert(doc.id.clone(), doc);
        }

        info!(folder = %root.display(), pages = pages.len(), "loaded local wiki");
        Ok(Self { pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn read_page(path: &Path, folder_name: &str) -> Result<Document, ContentError> {
    let html = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Document::new(
        stem.clone(),
        stem,
        strip_html(&html),
        format!("/{}/{}", folder_name, file_name),
    ))
}

#[async_trait]
impl ContentProvider for LocalWiki {
    fn name(&self) -> &str {
        "Local wiki"
    }

    async fn list_page_ids(&self) -> Result<Vec<String>, ContentError> {
        Ok(self.pages.keys().cloned().collect())
    }

    async fn get_document(&self, id: &str) -> Result<Document, ContentError> {
        self.pages
            .get(id)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(id.to_string()))
    }

    /// The local wiki has no search index.
    async fn keyword_search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<String>, ContentError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn wiki_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Deployments.html"),
            "<html><body><h1>Deploy</h1><p>Use the pipeline.</p></body></html>",
        )
        .unwrap();
        std::fs::write(dir.path().join("Benefits.html"), "<p>Dental plan</p>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_open_reads_html_pages() {
        let dir = wiki_dir();
        let wiki = LocalWiki::open(dir.path()).unwrap();

        assert_eq!(wiki.len(), 2);
        let ids = wiki.list_page_ids().await.unwrap();
        assert_eq!(ids, vec!["Benefits", "Deployments"]);
    }

    #[tokio::test]
    async fn test_get_document() {
        let dir = wiki_dir();
        let folder = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        let wiki = LocalWiki::open(dir.path()).unwrap();

        let doc = wiki.get_document("Deployments").await.unwrap();
        assert_eq!(doc.title, "Deployments");
        assert_eq!(doc.content, "DeployUse the pipeline.");
        assert_eq!(doc.url, format!("/{}/Deployments.html", folder));

        let err = wiki.get_document("Missing").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreadable_page_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Good.html"), "<p>fine</p>").unwrap();
        std::fs::write(dir.path().join("Latin1.html"), b"caf\xe9").unwrap();

        let wiki = LocalWiki::open(dir.path()).unwrap();
        assert_eq!(wiki.list_page_ids().await.unwrap(), vec!["Good"]);
    }

    #[tokio::test]
    async fn test_folder_with_glob_characters() {
        let parent = TempDir::new().unwrap();
        let folder = parent.path().join("wiki[old]");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("Home.html"), "<p>home</p>").unwrap();

        let wiki = LocalWiki::open(&folder).unwrap();
        assert_eq!(wiki.len(), 1);
        let doc = wiki.get_document("Home").await.unwrap();
        assert_eq!(doc.url, "/wiki[old]/Home.html");
    }

    #[tokio::test]
    async fn test_missing_folder_is_empty() {
        let dir = TempDir::new().unwrap();
        let wiki = LocalWiki::open(dir.path().join("nope")).unwrap();
        assert!(wiki.is_empty());
        assert!(wiki.keyword_search("anything", 5).await.unwrap().is_empty());
    }
}
