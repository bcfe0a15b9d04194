//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::models::{FetchedPage, RecommendationBuckets, SearchQuery, SearchResult};
use crate::sources::{window, DocumentationSource, SourceError};

/// A mock source that returns predefined responses.
///
/// Search hits are windowed exactly like the real source, so paging
/// behaviour can be tested without a network.
#[derive(Debug, Default)]
pub struct MockSource {
    hits: Mutex<Vec<SearchResult>>,
    recommendations: Mutex<RecommendationBuckets>,
    pages: Mutex<HashMap<String, FetchedPage>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSource {
    /// Create a new mock source with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the full hit list searched by every query.
    pub fn set_search_hits(&self, hits: Vec<SearchResult>) {
        *lock(&self.hits) = hits;
    }

    /// Set the recommendations returned for any target.
    pub fn set_recommendations(&self, buckets: RecommendationBuckets) {
        *lock(&self.recommendations) = buckets;
    }

    /// Serve `page` when `url` is fetched.
    pub fn add_page(&self, url: impl Into<String>, page: FetchedPage) {
        lock(&self.pages).insert(url.into(), page);
    }

    /// Make every call fail with an API error carrying `message`.
    pub fn set_failure(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    /// Sleep before answering each call.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Number of upstream calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.failure).clone() {
            Some(message) => Err(SourceError::Api(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentationSource for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        self.enter().await?;
        let hits = lock(&self.hits).clone();
        Ok(window(hits, query))
    }

    async fn recommend(&self, _target: &str) -> Result<RecommendationBuckets, SourceError> {
        self.enter().await?;
        Ok(lock(&self.recommendations).clone())
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, SourceError> {
        self.enter().await?;
        lock(&self.pages)
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Api(format!("Failed to fetch {} - status code 404", url)))
    }
}

/// Helper to build a search hit for testing.
pub fn make_hit(slug: &str, title: &str) -> SearchResult {
    SearchResult::new(0, format!("https://docs.aws.amazon.com/{}.html", slug), title)
        .with_context(format!("About {}", title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_windows_hits() {
        let source = MockSource::new();
        source.set_search_hits((0..5).map(|i| make_hit(&format!("p{i}"), &format!("P{i}"))).collect());

        let results = source
            .search(&SearchQuery::new("q").max_results(2).start_index(3))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank_order, 4);
        assert_eq!(results[1].title, "P4");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_and_missing_page() {
        let source = MockSource::new();
        assert!(source.fetch("https://docs.aws.amazon.com/none.html").await.is_err());

        source.set_failure("boom");
        let err = source.recommend("x").await.unwrap_err();
        assert_eq!(err.to_string(), "API error: boom");
    }
}
