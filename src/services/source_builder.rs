//! Length-budgeted assembly of grounding sources.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ContentError;
use crate::models::{SourceMap, SourceReference};
use crate::sources::ContentProvider;
use crate::utils::truncate_chars;

/// Add one source, truncated to whatever budget remains.
///
/// Returns `false` once the budget is used up and no further sources
/// should be added. Duplicate ids are ignored.
pub fn push_within_budget(
    sources: &mut SourceMap,
    budget: usize,
    id: &str,
    content: &str,
    url: &str,
    title: &str,
) -> bool {
    let used = sources.total_len();
    if used >= budget {
        return false;
    }
    if sources.contains_key(id) {
        return true;
    }

    let excerpt = truncate_chars(content, budget - used);
    let excerpt_len = excerpt.chars().count();
    sources.insert(id, SourceReference::new(excerpt, url, title));

    used + excerpt_len < budget
}

/// Fetches pages by id and keeps their content within a character budget.
pub struct SourceReferenceBuilder {
    content: Arc<dyn ContentProvider>,
    budget: usize,
    max_failures: usize,
}

impl SourceReferenceBuilder {
    pub fn new(content: Arc<dyn ContentProvider>, budget: usize, max_failures: usize) -> Self {
        Self {
            content,
            budget,
            max_failures,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Build sources from `ids` in ranking order.
    ///
    /// A page that fails to load is skipped. Once more than `max_failures`
    /// pages have failed the sources gathered so far are returned. If no page
    /// could be loaded at all, the last fetch error is returned instead.
    pub async fn build(&self, ids: &[String]) -> Result<SourceMap, ContentError> {
        let mut sources = SourceMap::new();
        let mut failures = 0;
        let mut last_error = None;

        for id in ids {
            if sources.contains_key(id) {
                continue;
            }

            let doc = match self.content.get_document(id).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(page_id = %id, error = %e, "failed to fetch source page");
                    failures += 1;
                    last_error = Some(e);
                    if failures > self.max_failures {
                        warn!(failures, "too many fetch failures, using sources so far");
                        break;
                    }
                    continue;
                }
            };

            let more = push_within_budget(
                &mut sources,
                self.budget,
                id,
                &doc.content,
                &doc.url,
                &doc.title,
            );
            if !more {
                break;
            }
        }

        if sources.is_empty()
            && let Some(e) = last_error
        {
            return Err(e);
        }

        debug!(
            requested = ids.len(),
            included = sources.len(),
            chars = sources.total_len(),
            "built sources"
        );
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::FakeContent;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn builder(provider: FakeContent, budget: usize) -> (Arc<FakeContent>, SourceReferenceBuilder) {
        let provider = Arc::new(provider);
        let builder = SourceReferenceBuilder::new(provider.clone(), budget, 5);
        (provider, builder)
    }

    #[tokio::test]
    async fn test_everything_fits_unmodified() {
        let (_, builder) = builder(
            FakeContent::with_pages(vec![
                FakeContent::page("a", "alpha"),
                FakeContent::page("b", "bravo"),
                FakeContent::page("c", "charlie"),
            ]),
            100,
        );

        let sources = builder.build(&ids(&["b", "a", "c"])).await.unwrap();
        let keys: Vec<&str> = sources.keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(sources.get("a").unwrap().content, "alpha");
        assert_eq!(sources.get("c").unwrap().content, "charlie");
        assert_eq!(sources.get("a").unwrap().url, "https://wiki/a");
        assert_eq!(sources.get("a").unwrap().title, "Title a");
    }

    #[tokio::test]
    async fn test_oversized_first_page_is_truncated_alone() {
        let big = "x".repeat(50);
        let (provider, builder) = builder(
            FakeContent::with_pages(vec![
                FakeContent::page("a", &big),
                FakeContent::page("b", "bravo"),
            ]),
            40,
        );

        let sources = builder.build(&ids(&["a", "b"])).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources.get("a").unwrap().len(), 40);
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_crossing_page_is_truncated_and_stops() {
        let (provider, builder) = builder(
            FakeContent::with_pages(vec![
                FakeContent::page("a", "0123456789"),
                FakeContent::page("b", "abcdefghij"),
                FakeContent::page("c", "never"),
            ]),
            15,
        );

        let sources = builder.build(&ids(&["a", "b", "c"])).await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.get("b").unwrap().content, "abcde");
        assert_eq!(sources.total_len(), 15);
        assert_eq!(provider.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_budget_counts_characters() {
        let (_, builder) = builder(
            FakeContent::with_pages(vec![FakeContent::page("a", "ééééé")]),
            3,
        );

        let sources = builder.build(&ids(&["a"])).await.unwrap();
        assert_eq!(sources.get("a").unwrap().content, "ééé");
    }

    #[tokio::test]
    async fn test_total_never_exceeds_budget() {
        let pages: Vec<_> = (0..20)
            .map(|i| FakeContent::page(&i.to_string(), &"y".repeat(7 + i)))
            .collect();
        let all: Vec<String> = (0..20).map(|i| i.to_string()).collect();

        for budget in [1, 7, 8, 50, 123, 400] {
            let (_, builder) = builder(FakeContent::with_pages(pages.clone()), budget);
            let sources = builder.build(&all).await.unwrap();
            assert!(!sources.is_empty());
            assert!(sources.total_len() <= budget, "budget {budget}");
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped() {
        let mut provider = FakeContent::with_pages(vec![
            FakeContent::page("a", "alpha"),
            FakeContent::page("c", "charlie"),
        ]);
        provider.broken = vec!["b".to_string()];
        let (_, builder) = builder(provider, 100);

        let sources = builder.build(&ids(&["a", "b", "c"])).await.unwrap();
        let keys: Vec<&str> = sources.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_gives_up_after_too_many_failures() {
        let mut provider = FakeContent::with_pages(vec![
            FakeContent::page("ok", "fine"),
            FakeContent::page("late", "unreached"),
        ]);
        provider.broken = (0..6).map(|i| format!("bad{i}")).collect();
        let (provider, builder) = builder(provider, 100);

        let mut order = ids(&["ok"]);
        order.extend(provider.broken.iter().cloned());
        order.push("late".to_string());

        let sources = builder.build(&order).await.unwrap();
        let keys: Vec<&str> = sources.keys().collect();
        assert_eq!(keys, vec!["ok"]);
        assert_eq!(provider.fetch_count(), 7);
    }

    #[tokio::test]
    async fn test_all_failed_returns_error() {
        let mut provider = FakeContent::default();
        provider.broken = vec!["x".to_string()];
        let (_, builder) = builder(provider, 100);

        assert!(builder.build(&ids(&["x"])).await.is_err());
        assert!(builder.build(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_push_within_budget_ignores_duplicates() {
        let mut sources = SourceMap::new();
        assert!(push_within_budget(&mut sources, 100, "a", "one", "u", "t"));
        assert!(push_within_budget(&mut sources, 100, "a", "two", "u", "t"));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources.get("a").unwrap().content, "one");
    }
}
