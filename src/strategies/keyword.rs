use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Strategy, answered_using};
use crate::error::StrategyError;
use crate::models::{SourceMap, StrategyResponse};
use crate::services::{ChatMessage, CompletionProvider, SourceReferenceBuilder};
use crate::sources::ContentProvider;

pub const NAME: &str = "directWiki";
pub const DISPLAY_NAME: &str = "Direct Wiki Search";

const REWRITE_PROMPT: &str = "Convert the following question into a search query that could be used to find relevant documents.
Return the search terms and nothing else.
Do not include any special characters like '+'.
If you cannot generate a search query, return just the number 0.";

/// Rewrites the question into search terms and runs the wiki's own keyword
/// search. Always available.
pub struct KeywordStrategy {
    content: Arc<dyn ContentProvider>,
    completer: Arc<dyn CompletionProvider>,
    builder: Arc<SourceReferenceBuilder>,
    limit: usize,
}

impl KeywordStrategy {
    pub fn new(
        content: Arc<dyn ContentProvider>,
        completer: Arc<dyn CompletionProvider>,
        builder: Arc<SourceReferenceBuilder>,
        limit: usize,
    ) -> Self {
        Self {
            content,
            completer,
            builder,
            limit,
        }
    }
}

/// `None` when the model declined to produce a query.
fn clean_search_term(raw: &str) -> Option<String> {
    let term = raw.trim().trim_matches('"').trim();
    if term.is_empty() || term == "0" {
        None
    } else {
        Some(term.to_string())
    }
}

#[async_trait]
impl Strategy for KeywordStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn display_name(&self) -> &str {
        DISPLAY_NAME
    }

    async fn respond(&self, question: &str) -> Result<StrategyResponse, StrategyError> {
        let messages = [ChatMessage::system(REWRITE_PROMPT), ChatMessage::user(question)];
        let raw = self.completer.complete(&messages).await?;

        let Some(term) = clean_search_term(&raw) else {
            debug!(question, "no search term for question");
            return Ok(StrategyResponse::new(
                SourceMap::new(),
                answered_using(DISPLAY_NAME),
                None,
            ));
        };

        let ids = self.content.keyword_search(&term, self.limit).await?;
        debug!(term = %term, hits = ids.len(), "keyword search");
        let sources = self.builder.build(&ids).await?;

        Ok(StrategyResponse::new(
            sources,
            answered_using(DISPLAY_NAME),
            Some(term),
        ))
    }
}
