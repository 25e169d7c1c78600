//! Question answering over the selected strategy's sources.

mod citations;
mod prompt;

pub use citations::reconcile;
pub use prompt::{WIKI_QUESTION_PROMPT, format_sources, grounded_messages};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::AppError;
use crate::models::{AnswerReference, AnswerResponse, StrategyResponse};
use crate::services::CompletionProvider;
use crate::strategies::StrategyRegistry;

pub struct Copilot {
    registry: Arc<StrategyRegistry>,
    completer: Arc<dyn CompletionProvider>,
}

impl Copilot {
    pub fn new(registry: Arc<StrategyRegistry>, completer: Arc<dyn CompletionProvider>) -> Self {
        Self {
            registry,
            completer,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Answer `question` with the named strategy, or the default one.
    pub async fn ask(&self, question: &str, strategy: Option<&str>) -> Result<AnswerResponse, AppError> {
        let strategy = self.registry.resolve(strategy);
        info!(strategy = strategy.name(), "answering question");

        let response = strategy.respond(question).await?;
        self.answer_from(question, response).await
    }

    async fn answer_from(
        &self,
        question: &str,
        response: StrategyResponse,
    ) -> Result<AnswerResponse, AppError> {
        let StrategyResponse {
            sources,
            notes,
            search_term,
        } = response;

        if sources.is_empty() {
            let mut answer =
                format!("Could not find any references in the wiki related to \"{question}\".");
            if let Some(term) = search_term.as_deref().filter(|t| !t.trim().is_empty()) {
                answer.push_str(&format!(" Searched for \"{term}\""));
            }
            return Ok(AnswerResponse {
                answer,
                references: BTreeMap::new(),
                notes,
                all_references: Vec::new(),
                search_query: search_term,
            });
        }

        let messages = grounded_messages(&sources, question);
        let reply = self.completer.complete(&messages).await?;
        let (answer, cited) = reconcile(&reply, |id| sources.contains_key(id));
        debug!(sources = sources.len(), cited = cited.len(), "answer reconciled");

        let references = cited
            .iter()
            .zip(1u32..)
            .filter_map(|(id, n)| {
                sources
                    .get(id)
                    .map(|s| (n, AnswerReference::from_source(id, s)))
            })
            .collect();
        let all_references = sources
            .iter()
            .map(|(id, s)| AnswerReference::from_source(id, s))
            .collect();

        Ok(AnswerResponse {
            answer,
            references,
            notes,
            all_references,
            search_query: search_term,
        })
    }
}
