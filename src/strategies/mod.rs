//! Retrieval strategies.
//!
//! A strategy turns a question into grounding sources. Strategies backed by
//! their own store also implement [`Indexer`] so the ingestion pipeline can
//! (re)build that store.

mod hybrid;
mod keyword;
mod vector;

pub use hybrid::HybridSearchStrategy;
pub use keyword::KeywordStrategy;
pub use vector::VectorStoreStrategy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{IndexError, StrategyError};
use crate::models::{ContentChunk, StrategyResponse};

/// Answerable facet: question to sources.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Unique lookup name, e.g. `qdrantVector`.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    async fn respond(&self, question: &str) -> Result<StrategyResponse, StrategyError>;
}

/// Indexable facet: ingest chunks into the strategy's backing store.
#[async_trait]
pub trait Indexer: Send + Sync {
    fn name(&self) -> &str;

    /// Ensure the schema exists, then upsert every chunk.
    async fn build_database(&self, chunks: &[ContentChunk]) -> Result<(), IndexError>;
}

/// Immutable, ordered set of strategies. The first one is the default.
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new(default: Arc<dyn Strategy>) -> Self {
        Self {
            strategies: vec![default],
        }
    }

    /// Append a strategy. A strategy whose name is already taken is dropped.
    #[must_use]
    pub fn with(mut self, strategy: Arc<dyn Strategy>) -> Self {
        if self.find(strategy.name()).is_some() {
            tracing::warn!(strategy = strategy.name(), "duplicate strategy ignored");
            return self;
        }
        self.strategies.push(strategy);
        self
    }

    pub fn default_strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategies[0]
    }

    /// Case-insensitive lookup.
    pub fn find(&self, name: &str) -> Option<&Arc<dyn Strategy>> {
        self.strategies
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Strategy for `name`; blank or unknown names get the default.
    pub fn resolve(&self, name: Option<&str>) -> &Arc<dyn Strategy> {
        name.map(str::trim)
            .filter(|n| !n.is_empty())
            .and_then(|n| self.find(n))
            .unwrap_or_else(|| self.default_strategy())
    }

    /// `(name, display name)` in registry order.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.strategies
            .iter()
            .map(|s| (s.name(), s.display_name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Serializes as `{name: displayName}` in registry order.
impl Serialize for StrategyRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.strategies.len()))?;
        for strategy in &self.strategies {
            map.serialize_entry(strategy.name(), strategy.display_name())?;
        }
        map.end()
    }
}

fn answered_using(display_name: &str) -> String {
    format!("Answered using {}", display_name)
}
