mod answer;
mod config;
mod document;
mod format;

pub use answer::{AnswerReference, AnswerResponse, SourceMap, SourceReference, StrategyResponse};
pub use config::{
    AiSearchConfig, Capabilities, Config, ConfluenceConfig, Configurable, DEFAULT_BIND,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_LOCAL_WIKI, DEFAULT_MAX_RESULTS, DEFAULT_MONGO_DATABASE,
    DEFAULT_POSTGRES_TABLE, DEFAULT_QDRANT_COLLECTION, DEFAULT_SOURCE_BUDGET, EmbeddingConfig,
    IndexingConfig, MongoConfig, OpenAIConfig, PROJECT_CONFIG_DIR, PostgresConfig, QdrantConfig,
    ResolvedConfig, RetrievalConfig, ServerConfig, WikiConfig,
};
pub use document::{ContentChunk, Document};
pub use format::OutputFormat;
