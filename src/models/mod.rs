//! Core data models for documentation search, recommendations and pages.

mod document;
mod recommendation;
mod search;

pub use document::{ExtractedDocument, FetchedPage};
pub use recommendation::{
    format_recommendations, RecommendationBuckets, RecommendationResult, DEFAULT_RECOMMENDATIONS,
};
pub use search::{format_search_results, SearchQuery, SearchResult, DEFAULT_SEARCH_RESULTS};
