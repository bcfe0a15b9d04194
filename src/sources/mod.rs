//! Upstream documentation services.
//!
//! This module defines the [`DocumentationSource`] trait, the seam between the
//! MCP tool handlers and the network. A source covers the three upstream
//! collaborators the tools need:
//!
//! - a search service returning ranked hits
//! - a recommendation service returning categorised suggestions
//! - a page fetcher returning raw documentation pages
//!
//! [`AwsDocsSource`] talks to the public AWS documentation services.
//! [`MockSource`] serves canned data and is used throughout the tests.
//!
//! # Endpoint configuration
//!
//! The service URLs come from the `upstream` configuration section and can be
//! pointed at a local stub:
//!
//! ```bash
//! export AWS_DOCS_MCP__UPSTREAM__SEARCH_URL="http://127.0.0.1:9000/search"
//! export AWS_DOCS_MCP__UPSTREAM__RECOMMEND_URL="http://127.0.0.1:9000/recommendations"
//! ```

mod aws;
mod mock;

pub use aws::{AwsDocsSource, AwsEndpoints, RECOMMENDATIONS_API_URL, SEARCH_API_URL};
pub use mock::{make_hit, MockSource};

use crate::models::{FetchedPage, RecommendationBuckets, SearchQuery, SearchResult};
use async_trait::async_trait;

/// The interface tool handlers use to reach documentation services.
///
/// Implementations must not fabricate results: an unrecognised payload
/// yields empty results, a transport or status failure yields an error.
#[async_trait]
pub trait DocumentationSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (used in logs)
    fn id(&self) -> &str;

    /// Search the documentation, returning the window the query asks for
    ///
    /// `rank_order` on the returned hits starts at `query.start_index + 1`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError>;

    /// Recommendations for a documentation URL or a content excerpt
    async fn recommend(&self, target: &str) -> Result<RecommendationBuckets, SourceError>;

    /// Fetch a documentation page as-is
    async fn fetch(&self, url: &str) -> Result<FetchedPage, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream call did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Parsing error (JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// API error from the source, usually a non-success status
    #[error("API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Cut the query's window out of a full ranked hit list and number it
pub(crate) fn window(hits: Vec<SearchResult>, query: &SearchQuery) -> Vec<SearchResult> {
    hits.into_iter()
        .skip(query.start_index)
        .take(query.max_results)
        .enumerate()
        .map(|(i, mut hit)| {
            hit.rank_order = query.start_index + i + 1;
            hit
        })
        .collect()
}
