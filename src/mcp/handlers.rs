//! Handlers behind the documentation tools.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::content::{extract_document, format_page, paginate, ContentExtractor, DEFAULT_MAX_LENGTH};
use crate::mcp::tools::{ToolCallResult, ToolError, ToolHandler, ToolSettings};
use crate::models::{
    format_recommendations, format_search_results, ExtractedDocument, SearchQuery,
    DEFAULT_RECOMMENDATIONS, DEFAULT_SEARCH_RESULTS,
};
use crate::sources::{DocumentationSource, SourceError};
use crate::utils::validate_docs_url;

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::Validation(e.to_string()))
}

/// Run an upstream call under the configured timeout
async fn bounded<T>(
    settings: &ToolSettings,
    source: &dyn DocumentationSource,
    call: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, ToolError> {
    match tokio::time::timeout(settings.timeout, call).await {
        Ok(result) => result.map_err(|e| {
            tracing::warn!(source = source.id(), error = %e, "upstream call failed");
            ToolError::Upstream(e)
        }),
        Err(_) => {
            tracing::warn!(
                source = source.id(),
                timeout_secs = settings.timeout.as_secs(),
                "upstream call timed out"
            );
            Err(ToolError::Timeout(settings.timeout))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_search_results")]
    max_results: usize,
    #[serde(default)]
    start_index: usize,
}

fn default_search_results() -> usize {
    DEFAULT_SEARCH_RESULTS
}

/// `search_documentation`
#[derive(Debug)]
pub struct SearchDocumentationHandler {
    pub source: Arc<dyn DocumentationSource>,
    pub settings: Arc<ToolSettings>,
}

#[async_trait::async_trait]
impl ToolHandler for SearchDocumentationHandler {
    async fn execute(&self, args: Value) -> Result<ToolCallResult, ToolError> {
        let args: SearchArgs = parse_args(args)?;
        let phrase = args.query.trim();
        if phrase.is_empty() {
            return Err(ToolError::Validation("query must not be empty".to_string()));
        }

        let query = SearchQuery::new(phrase)
            .max_results(args.max_results)
            .start_index(args.start_index);
        let results = bounded(&self.settings, self.source.as_ref(), self.source.search(&query)).await?;

        tracing::debug!(query = phrase, results = results.len(), "search_documentation");
        Ok(ToolCallResult::text(format_search_results(phrase, &results))
            .with_structured(json!({ "results": results })))
    }
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    url: String,
    #[serde(default = "default_max_length")]
    max_length: usize,
    #[serde(default)]
    start_index: usize,
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

/// `read_documentation`
#[derive(Debug)]
pub struct ReadDocumentationHandler {
    pub source: Arc<dyn DocumentationSource>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub settings: Arc<ToolSettings>,
}

#[async_trait::async_trait]
impl ToolHandler for ReadDocumentationHandler {
    async fn execute(&self, args: Value) -> Result<ToolCallResult, ToolError> {
        let args: ReadArgs = parse_args(args)?;
        let url = validate_docs_url(&args.url, &self.settings.allowed_hosts)?.to_string();

        let page = bounded(&self.settings, self.source.as_ref(), self.source.fetch(&url)).await?;
        let document = if page.is_html() {
            extract_document(self.extractor.as_ref(), &url, &page.body)
        } else {
            ExtractedDocument::new("", &url, page.body)
        };

        let total_length = document.content.chars().count();
        let next_start_index = paginate(&document.content, args.start_index, args.max_length)
            .and_then(|window| window.next_index);
        let text = format_page(&url, &document.content, args.start_index, args.max_length);

        tracing::debug!(url = %url, total_length, start_index = args.start_index, "read_documentation");
        Ok(ToolCallResult::text(text).with_structured(json!({
            "title": document.title,
            "url": document.url,
            "word_count": document.word_count,
            "total_length": total_length,
            "next_start_index": next_start_index,
        })))
    }
}

#[derive(Debug, Deserialize)]
struct RecommendArgs {
    content_or_url: String,
    #[serde(default = "default_recommendations")]
    max_results: usize,
}

fn default_recommendations() -> usize {
    DEFAULT_RECOMMENDATIONS
}

/// `recommend`
#[derive(Debug)]
pub struct RecommendHandler {
    pub source: Arc<dyn DocumentationSource>,
    pub settings: Arc<ToolSettings>,
}

#[async_trait::async_trait]
impl ToolHandler for RecommendHandler {
    async fn execute(&self, args: Value) -> Result<ToolCallResult, ToolError> {
        let args: RecommendArgs = parse_args(args)?;
        let target = args.content_or_url.trim();
        if target.is_empty() {
            return Err(ToolError::Validation("content_or_url must not be empty".to_string()));
        }

        let buckets = bounded(&self.settings, self.source.as_ref(), self.source.recommend(target)).await?;
        let results = buckets.merge(args.max_results);

        Ok(ToolCallResult::text(format_recommendations(target, &results))
            .with_structured(json!({ "results": results })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ExtractionStrategy;
    use crate::mcp::tools::ToolRegistry;
    use crate::models::{FetchedPage, RecommendationBuckets, RecommendationResult};
    use crate::sources::{make_hit, MockSource};
    use std::time::Duration;

    const PAGE_URL: &str = "https://docs.aws.amazon.com/lambda/latest/dg/welcome.html";

    fn registry_with(source: Arc<MockSource>, settings: ToolSettings) -> ToolRegistry {
        ToolRegistry::documentation(source, ExtractionStrategy::Dom.build().unwrap(), settings)
    }

    fn registry(source: Arc<MockSource>) -> ToolRegistry {
        registry_with(source, ToolSettings::default())
    }

    #[tokio::test]
    async fn test_search_ranks_from_start_index() {
        let source = Arc::new(MockSource::new());
        source.set_search_hits((0..6).map(|i| make_hit(&format!("p{i}"), &format!("Page {i}"))).collect());

        let result = registry(source)
            .invoke(
                "search_documentation",
                json!({"query": "lambda", "max_results": 2, "start_index": 2}),
            )
            .await
            .unwrap();

        assert!(!result.is_error);
        assert!(result.first_text().unwrap().starts_with("Found 2 results for 'lambda'"));
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["results"][0]["rank_order"], 3);
        assert_eq!(structured["results"][1]["rank_order"], 4);
    }

    #[tokio::test]
    async fn test_read_rejects_foreign_domain_without_fetching() {
        let source = Arc::new(MockSource::new());
        let err = registry(source.clone())
            .invoke("read_documentation", json!({"url": "https://example.com/page.html"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidUrl(_)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_read_converts_and_paginates() {
        let source = Arc::new(MockSource::new());
        source.add_page(
            PAGE_URL,
            FetchedPage::new(
                PAGE_URL,
                "<html><head><title>What is Lambda?</title></head><body><main><h1>What is AWS Lambda?</h1><p>Lambda runs code without servers.</p></main></body></html>",
            )
            .content_type("text/html"),
        );

        let result = registry(source)
            .invoke("read_documentation", json!({"url": PAGE_URL, "max_length": 10}))
            .await
            .unwrap();

        assert_eq!(
            result.first_text().unwrap(),
            format!(
                "AWS Documentation from {PAGE_URL}:\n\n# What is \n\n<e>Content truncated. Call the read_documentation tool with start_index=10 to get more content.</e>"
            )
        );

        let structured = result.structured_content.unwrap();
        assert_eq!(structured["next_start_index"], 10);
        assert_eq!(structured["title"], "What is Lambda?");
        assert_eq!(
            structured["total_length"],
            "# What is AWS Lambda?\n\nLambda runs code without servers.".chars().count()
        );
    }

    #[tokio::test]
    async fn test_read_passes_non_html_through() {
        let source = Arc::new(MockSource::new());
        let url = "https://docs.aws.amazon.com/notes.txt";
        source.add_page(url, FetchedPage::new(url, "<b>kept</b> as-is").content_type("text/plain"));

        let result = registry(source)
            .invoke("read_documentation", json!({"url": url}))
            .await
            .unwrap();
        assert_eq!(
            result.first_text().unwrap(),
            format!("AWS Documentation from {url}:\n\n<b>kept</b> as-is")
        );
    }

    #[tokio::test]
    async fn test_read_empty_page_reports_placeholder() {
        let source = Arc::new(MockSource::new());
        source.add_page(
            PAGE_URL,
            FetchedPage::new(PAGE_URL, "<html><body><div id=\"app\"></div></body></html>")
                .content_type("text/html"),
        );

        let result = registry(source)
            .invoke("read_documentation", json!({"url": PAGE_URL}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.first_text().unwrap().contains("Page failed to be simplified from HTML"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_tool_error() {
        let source = Arc::new(MockSource::new());
        source.set_failure("service unavailable");

        let err = registry(source)
            .invoke("search_documentation", json!({"query": "ec2"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let source = Arc::new(MockSource::new());
        source.set_delay(Duration::from_millis(500));
        let settings = ToolSettings {
            timeout: Duration::from_millis(50),
            ..ToolSettings::default()
        };

        let err = registry_with(source, settings)
            .invoke("recommend", json!({"content_or_url": PAGE_URL}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_recommendations_merge_in_category_order() {
        let rec = |name: &str| RecommendationResult::new(format!("https://docs.aws.amazon.com/{name}.html"), name);
        let source = Arc::new(MockSource::new());
        source.set_recommendations(RecommendationBuckets {
            highly_rated: vec![rec("A"), rec("B")],
            journey: vec![rec("C")],
            new: vec![rec("D")],
            similar: vec![rec("E")],
        });

        let result = registry(source)
            .invoke("recommend", json!({"content_or_url": PAGE_URL, "max_results": 3}))
            .await
            .unwrap();

        let titles: Vec<&str> = result.structured_content.as_ref().unwrap()["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let err = registry(Arc::new(MockSource::new()))
            .invoke("search_documentation", json!({"query": "   "}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }
}
