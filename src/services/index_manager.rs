//! Ingestion pipeline: list pages, embed them, feed every indexer.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::IndexError;
use crate::models::{ContentChunk, IndexingConfig};
use crate::services::chunker::Chunker;
use crate::sources::ContentProvider;
use crate::strategies::Indexer;

/// Random pause between embedding calls, keeping ingestion under the
/// embedding provider's rate limit.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    min: Duration,
    max: Duration,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn from_config(config: &IndexingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.throttle_min_ms),
            Duration::from_millis(config.throttle_max_ms),
        )
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Next delay, uniformly drawn from `[min, max]`.
    pub fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max == min {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

pub struct IndexManager {
    content: Arc<dyn ContentProvider>,
    chunker: Arc<dyn Chunker>,
    indexers: Vec<Arc<dyn Indexer>>,
    throttle: Throttle,
    show_progress: bool,
    running: Mutex<()>,
}

impl IndexManager {
    pub fn new(
        content: Arc<dyn ContentProvider>,
        chunker: Arc<dyn Chunker>,
        indexers: Vec<Arc<dyn Indexer>>,
        throttle: Throttle,
    ) -> Self {
        Self {
            content,
            chunker,
            indexers,
            throttle,
            show_progress: false,
            running: Mutex::new(()),
        }
    }

    /// Draw a progress bar while embedding pages.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn indexer_names(&self) -> Vec<&str> {
        self.indexers.iter().map(|i| i.name()).collect()
    }

    /// Rebuild every indexer from the current wiki content and return how
    /// many succeeded. A failing indexer is logged and does not stop the
    /// others. Concurrent calls run one after another.
    pub async fn init(&self) -> Result<usize, IndexError> {
        let _guard = self.running.lock().await;

        if self.indexers.is_empty() {
            info!("no indexers configured");
            return Ok(0);
        }

        let chunks = self.collect_chunks().await?;
        info!(
            chunks = chunks.len(),
            indexers = self.indexers.len(),
            "building indexes"
        );

        let mut succeeded = 0;
        for indexer in &self.indexers {
            match indexer.build_database(&chunks).await {
                Ok(()) => {
                    info!(indexer = indexer.name(), "index built");
                    succeeded += 1;
                }
                Err(e) => {
                    error!(indexer = indexer.name(), error = %e, "index build failed");
                }
            }
        }

        Ok(succeeded)
    }

    async fn collect_chunks(&self) -> Result<Vec<ContentChunk>, IndexError> {
        let documents = self.content.list_all_documents().await?;

        let pb = if self.show_progress {
            let pb = ProgressBar::new(documents.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut chunks = Vec::with_capacity(documents.len());
        for (i, doc) in documents.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.throttle.next_delay()).await;
            }
            match self.chunker.chunk(doc).await {
                Ok(doc_chunks) => chunks.extend(doc_chunks),
                Err(e) => warn!(page_id = %doc.id, error = %e, "failed to chunk page"),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::services::chunker::WholePageChunker;
    use crate::services::provider::testing::FixedEmbedder;
    use crate::sources::testing::FakeContent;

    struct CountingIndexer {
        name: &'static str,
        fail: bool,
        received: AtomicUsize,
    }

    impl CountingIndexer {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                received: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Indexer for CountingIndexer {
        fn name(&self) -> &str {
            self.name
        }

        async fn build_database(&self, chunks: &[ContentChunk]) -> Result<(), IndexError> {
            self.received.store(chunks.len(), Ordering::SeqCst);
            if self.fail {
                return Err(IndexError::ChunkError("backend unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn manager(
        content: FakeContent,
        embedder: FixedEmbedder,
        indexers: Vec<Arc<dyn Indexer>>,
    ) -> IndexManager {
        IndexManager::new(
            Arc::new(content),
            Arc::new(WholePageChunker::new(Arc::new(embedder))),
            indexers,
            Throttle::none(),
        )
    }

    #[tokio::test]
    async fn test_failing_indexer_does_not_block_others() {
        let first = CountingIndexer::new("first", false);
        let broken = CountingIndexer::new("broken", true);
        let last = CountingIndexer::new("last", false);

        let content = FakeContent::with_pages(vec![
            FakeContent::page("1", "one"),
            FakeContent::page("2", "two"),
        ]);
        let manager = manager(
            content,
            FixedEmbedder::new(vec![1.0; 3]),
            vec![
                first.clone() as Arc<dyn Indexer>,
                broken.clone() as Arc<dyn Indexer>,
                last.clone() as Arc<dyn Indexer>,
            ],
        );

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        assert_eq!(manager.init().await.unwrap(), 2);
        let output = logs.contents();
        assert!(output.contains("index build failed"));
        assert!(output.contains("broken"));
        assert!(output.contains("backend unavailable"));
        assert_eq!(first.received.load(Ordering::SeqCst), 2);
        assert_eq!(broken.received.load(Ordering::SeqCst), 2);
        assert_eq!(last.received.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_indexers_skips_listing() {
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0; 3]));
        let content = Arc::new(FakeContent::with_pages(vec![FakeContent::page("1", "one")]));
        let manager = IndexManager::new(
            content.clone(),
            Arc::new(WholePageChunker::new(embedder.clone())),
            Vec::new(),
            Throttle::none(),
        );

        assert_eq!(manager.init().await.unwrap(), 0);
        assert_eq!(content.fetch_count(), 0);
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_unembeddable_page_is_skipped() {
        let indexer = CountingIndexer::new("only", false);
        let mut embedder = FixedEmbedder::new(vec![1.0; 3]);
        embedder.fail_on = Some("poison".to_string());
        let content = FakeContent::with_pages(vec![
            FakeContent::page("1", "fine"),
            FakeContent::page("2", "poison"),
            FakeContent::page("3", "also fine"),
        ]);

        let manager = manager(content, embedder, vec![indexer.clone() as Arc<dyn Indexer>]);
        assert_eq!(manager.init().await.unwrap(), 1);
        assert_eq!(indexer.received.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_throttle_stays_in_range() {
        let throttle = Throttle::new(Duration::from_millis(200), Duration::from_millis(500));
        for _ in 0..100 {
            let delay = throttle.next_delay();
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(500));
        }
        assert_eq!(Throttle::none().next_delay(), Duration::ZERO);
    }
}
