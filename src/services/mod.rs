mod ai_search;
mod chunker;
mod completion;
mod index_manager;
mod openai;
pub(crate) mod provider;
mod source_builder;
pub(crate) mod vector_store;

pub use ai_search::{AzureAISearch, HybridIndex, SearchHit, UploadStatus};
pub use chunker::{Chunker, WholePageChunker};
pub use completion::RetryingCompleter;
pub use index_manager::{IndexManager, Throttle};
pub use openai::OpenAIClient;
pub use provider::{ChatMessage, CompletionProvider, EmbeddingProvider, Role};
pub use source_builder::{SourceReferenceBuilder, push_within_budget};
pub use vector_store::{MongoIndex, PgVectorIndex, QdrantIndex, VectorIndex, check_dimension};
