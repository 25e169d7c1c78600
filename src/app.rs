//! Wires the configured backends into a copilot and an index manager.

use std::sync::Arc;

use tracing::{info, warn};

use crate::copilot::Copilot;
use crate::error::AppError;
use crate::models::{Capabilities, Config};
use crate::services::{
    AzureAISearch, CompletionProvider, EmbeddingProvider, IndexManager, MongoIndex, OpenAIClient,
    PgVectorIndex, QdrantIndex, RetryingCompleter, SourceReferenceBuilder, Throttle, VectorIndex,
    WholePageChunker,
};
use crate::sources::{ConfluenceClient, ContentProvider, LocalWiki};
use crate::strategies::{
    HybridSearchStrategy, Indexer, KeywordStrategy, Strategy, StrategyRegistry,
    VectorStoreStrategy,
};

/// Everything a request handler needs, built once at startup.
pub struct App {
    pub config: Config,
    pub capabilities: Capabilities,
    pub copilot: Arc<Copilot>,
    pub index_manager: Arc<IndexManager>,
}

struct Backends {
    strategies: Vec<Arc<dyn Strategy>>,
    indexers: Vec<Arc<dyn Indexer>>,
}

impl Backends {
    fn add<T>(&mut self, strategy: T)
    where
        T: Strategy + Indexer + 'static,
    {
        let strategy = Arc::new(strategy);
        self.strategies.push(strategy.clone());
        self.indexers.push(strategy);
    }
}

impl App {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        Self::build_with_progress(config, false).await
    }

    /// Like [`App::build`], with a progress bar while indexing embeds pages.
    pub async fn build_with_progress(config: Config, show_progress: bool) -> Result<Self, AppError> {
        let capabilities = config.capabilities();
        info!(backends = ?capabilities.enabled(), "building app");

        let content = content_provider(&config, &capabilities)?;
        let openai = Arc::new(OpenAIClient::new(&config.openai, config.embedding.dimension)?);
        let embedder: Arc<dyn EmbeddingProvider> = openai.clone();
        let completer: Arc<dyn CompletionProvider> =
            Arc::new(RetryingCompleter::new(openai, &config.openai));

        let retrieval = &config.retrieval;
        let builder = Arc::new(SourceReferenceBuilder::new(
            content.clone(),
            retrieval.source_budget,
            retrieval.max_fetch_failures,
        ));

        let default: Arc<dyn Strategy> = Arc::new(KeywordStrategy::new(
            content.clone(),
            completer.clone(),
            builder.clone(),
            retrieval.max_results,
        ));
        let mut backends = Backends {
            strategies: Vec::new(),
            indexers: Vec::new(),
        };

        let dimension = config.embedding.dimension;
        let k = retrieval.max_results;
        let max_failures = config.indexing.max_upsert_failures;
        let vector_strategy = |name, display, index: Arc<dyn VectorIndex>| {
            VectorStoreStrategy::new(name, display, index, embedder.clone(), builder.clone())
                .with_limits(k, max_failures)
        };

        if let Some(pg) = &capabilities.postgres {
            match PgVectorIndex::connect(pg, dimension) {
                Ok(index) => backends.add(vector_strategy(
                    "postgresVector",
                    "Postgres Vector Search + Wiki",
                    Arc::new(index),
                )),
                Err(e) => warn!(backend = "postgres", error = %e, "backend disabled"),
            }
        }

        if let Some(qdrant) = &capabilities.qdrant {
            match QdrantIndex::new(qdrant, dimension) {
                Ok(index) => backends.add(vector_strategy(
                    "qdrantVector",
                    "Qdrant Vector Search + Wiki",
                    Arc::new(index),
                )),
                Err(e) => warn!(backend = "qdrant", error = %e, "backend disabled"),
            }
        }

        if let Some(mongo) = &capabilities.mongo {
            match MongoIndex::connect(mongo, dimension).await {
                Ok(index) => backends.add(vector_strategy(
                    "mongoVector",
                    "MongoDB Vector Search + Wiki",
                    Arc::new(index),
                )),
                Err(e) => warn!(backend = "mongo", error = %e, "backend disabled"),
            }
        }

        if let Some(search) = &capabilities.ai_search {
            match AzureAISearch::new(search, dimension) {
                Ok(index) => backends.add(
                    HybridSearchStrategy::new(
                        Arc::new(index),
                        embedder.clone(),
                        retrieval.source_budget,
                    )
                    .with_limits(k, max_failures),
                ),
                Err(e) => warn!(backend = "ai_search", error = %e, "backend disabled"),
            }
        }

        let Backends {
            strategies,
            indexers,
        } = backends;
        let registry = strategies
            .into_iter()
            .fold(StrategyRegistry::new(default), StrategyRegistry::with);
        info!(strategies = registry.len(), indexers = indexers.len(), "strategies ready");

        let index_manager = IndexManager::new(
            content,
            Arc::new(WholePageChunker::new(embedder)),
            indexers,
            Throttle::from_config(&config.indexing),
        )
        .with_progress(show_progress);
        let copilot = Copilot::new(Arc::new(registry), completer);

        Ok(Self {
            config,
            capabilities,
            copilot: Arc::new(copilot),
            index_manager: Arc::new(index_manager),
        })
    }
}

fn content_provider(
    config: &Config,
    capabilities: &Capabilities,
) -> Result<Arc<dyn ContentProvider>, AppError> {
    if let Some(confluence) = &capabilities.confluence {
        info!(domain = %confluence.domain, "using Confluence");
        return Ok(Arc::new(ConfluenceClient::new(confluence)?));
    }
    let wiki = LocalWiki::open(&config.wiki.local_folder)?;
    info!(folder = %config.wiki.local_folder.display(), pages = wiki.len(), "using local wiki");
    Ok(Arc::new(wiki))
}
