//! Error types for the wiki copilot.

use thiserror::Error;

use crate::utils::retry::Retryable;

fn is_transient_status(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    msg.contains("503")
        || msg.contains("502")
        || msg.contains("504")
        || msg.contains("429")
        || lower.contains("unavailable")
        || lower.contains("too many requests")
}

/// Errors from the wiki content provider.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("page not found: {0}")]
    NotFound(String),

    #[error("wiki request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("wiki server error: {0}")]
    Server(String),

    #[error("invalid wiki response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding endpoint: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors from the chat completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("failed to connect to completion endpoint: {0}")]
    ConnectionError(String),

    #[error("completion server error: {0}")]
    ServerError(String),

    #[error("completion request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),

    #[error("completion returned no content")]
    EmptyResponse,

    #[error("completion timed out after {0}s")]
    Timeout(u64),

    #[error("completion failed after {} attempts: {}", .0.len(), list_attempts(.0))]
    ExhaustedRetries(Vec<CompletionError>),
}

fn list_attempts(errors: &[CompletionError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("[{}] {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        // Every attempt failure is retried until the attempt budget runs out.
        !matches!(self, CompletionError::ExhaustedRetries(_))
    }
}

/// Errors related to vector store and search index operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::SchemaError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::SearchError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
            VectorStoreError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors related to building an index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("chunking error: {0}")]
    ChunkError(String),

    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStoreError(#[from] VectorStoreError),

    #[error("content error: {0}")]
    ContentError(#[from] ContentError),

    #[error("gave up after {failures} failed upserts")]
    TooManyFailures { failures: usize },
}

/// Errors raised while a strategy gathers sources.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_retries_lists_every_attempt() {
        let err = CompletionError::ExhaustedRetries(vec![
            CompletionError::EmptyResponse,
            CompletionError::Timeout(60),
            CompletionError::ServerError("status 503".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("completion failed after 3 attempts"));
        assert!(msg.contains("[1] completion returned no content"));
        assert!(msg.contains("[2] completion timed out after 60s"));
        assert!(msg.contains("[3] completion server error: status 503"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_embedding_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ServerError("status 429: slow down".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 400: bad input".into()).is_retryable());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 1536,
                actual: 3
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_vector_store_retryable() {
        assert!(VectorStoreError::ConnectionError("refused".into()).is_retryable());
        assert!(VectorStoreError::SearchError("connection reset".into()).is_retryable());
        assert!(!VectorStoreError::UpsertError("bad payload".into()).is_retryable());
    }
}
