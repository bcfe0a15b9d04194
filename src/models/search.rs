//! Search request and result models.

use serde::{Deserialize, Serialize};

/// Default page size for documentation searches
pub const DEFAULT_SEARCH_RESULTS: usize = 10;

/// Search query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text search phrase
    pub query: String,

    /// Page size
    pub max_results: usize,

    /// Zero-based offset into the ranked result list
    pub start_index: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: DEFAULT_SEARCH_RESULTS,
            start_index: 0,
        }
    }
}

impl SearchQuery {
    /// Create a new search query with default paging
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the page size
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the offset of the first returned result
    pub fn start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }
}

/// A single ranked documentation search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based rank across the whole result list, not just this page
    pub rank_order: usize,

    /// Documentation page URL
    pub url: String,

    /// Page title
    pub title: String,

    /// Excerpt or summary, when the search service provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SearchResult {
    pub fn new(rank_order: usize, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            rank_order,
            url: url.into(),
            title: title.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Render search results as the numbered text block returned to clients
pub fn format_search_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No documentation found for '{}'.", query);
    }

    let mut out = format!("Found {} results for '{}':\n", results.len(), query);
    for result in results {
        out.push_str(&format!("\n{}. {}\n   URL: {}\n", result.rank_order, result.title, result.url));
        if let Some(context) = result.context.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!("   Context: {}\n", context));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("s3 bucket policy").max_results(3).start_index(20);
        assert_eq!(query.query, "s3 bucket policy");
        assert_eq!(query.max_results, 3);
        assert_eq!(query.start_index, 20);
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::new("lambda");
        assert_eq!(query.max_results, DEFAULT_SEARCH_RESULTS);
        assert_eq!(query.start_index, 0);
    }

    #[test]
    fn test_context_omitted_when_absent() {
        let result = SearchResult::new(1, "https://docs.aws.amazon.com/a.html", "A");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("context").is_none());
        assert_eq!(json["rank_order"], 1);
    }

    #[test]
    fn test_format_search_results() {
        let results = vec![
            SearchResult::new(4, "https://docs.aws.amazon.com/a.html", "Bucket policies")
                .with_context("Use bucket policies to grant access"),
            SearchResult::new(5, "https://docs.aws.amazon.com/b.html", "ACLs"),
        ];
        let text = format_search_results("bucket", &results);
        assert!(text.starts_with("Found 2 results for 'bucket':"));
        assert!(text.contains("4. Bucket policies\n   URL: https://docs.aws.amazon.com/a.html\n   Context: Use bucket policies"));
        assert!(text.contains("5. ACLs\n   URL: https://docs.aws.amazon.com/b.html\n"));
    }

    #[test]
    fn test_format_empty_results() {
        assert_eq!(
            format_search_results("nothing", &[]),
            "No documentation found for 'nothing'."
        );
    }
}
