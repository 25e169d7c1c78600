use serde::{Deserialize, Serialize};

/// A wiki page as returned by a content provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            url: url.into(),
        }
    }

    /// Text that gets embedded for this page: title, newline, body.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.content).trim().to_string()
    }
}

/// A unit of page content paired with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub url: String,
    pub content: String,
    pub chunk_index: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
}

impl ContentChunk {
    /// Chunk ids are `<document id>` for the first chunk and
    /// `<document id>:<index>` for any further ones, so re-indexing a page
    /// overwrites the same row.
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        if chunk_index == 0 {
            document_id.to_string()
        } else {
            format!("{}:{}", document_id, chunk_index)
        }
    }

    /// Deterministic UUID for stores that only accept UUID point ids.
    pub fn point_uuid(&self) -> String {
        use uuid::Uuid;
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.id.as_bytes()).to_string()
    }

    pub fn from_document(
        document: &Document,
        content: String,
        chunk_index: u32,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: Self::generate_id(&document.id, chunk_index),
            document_id: document.id.clone(),
            title: document.title.clone(),
            url: document.url.clone(),
            content,
            chunk_index,
            vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_trims() {
        let doc = Document::new("1", "  Title", "Body\n\n", "/1");
        assert_eq!(doc.embedding_text(), "Title\nBody");

        let untitled = Document::new("2", "", "only body", "/2");
        assert_eq!(untitled.embedding_text(), "only body");
    }

    #[test]
    fn test_chunk_generate_id() {
        assert_eq!(ContentChunk::generate_id("12345", 0), "12345");
        assert_eq!(ContentChunk::generate_id("12345", 2), "12345:2");
    }

    #[test]
    fn test_point_uuid_is_stable() {
        let doc = Document::new("abc123", "t", "c", "u");
        let a = ContentChunk::from_document(&doc, "c".into(), 0, vec![0.1]);
        let b = ContentChunk::from_document(&doc, "other".into(), 0, vec![0.2]);
        let c = ContentChunk::from_document(&doc, "c".into(), 1, vec![0.1]);

        assert_eq!(a.point_uuid().len(), 36);
        assert_eq!(a.point_uuid(), b.point_uuid());
        assert_ne!(a.point_uuid(), c.point_uuid());
    }

    #[test]
    fn test_from_document_copies_metadata() {
        let doc = Document::new("7", "Seven", "content", "https://wiki/7");
        let chunk = ContentChunk::from_document(&doc, doc.content.clone(), 0, vec![1.0; 4]);
        assert_eq!(chunk.document_id, "7");
        assert_eq!(chunk.title, "Seven");
        assert_eq!(chunk.url, "https://wiki/7");
        assert_eq!(chunk.vector.len(), 4);
    }
}
