//! AWS documentation services: search proxy, content recommendations, pages.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{
    FetchedPage, RecommendationBuckets, RecommendationResult, SearchQuery, SearchResult,
};
use crate::sources::{window, DocumentationSource, SourceError};
use crate::utils::HttpClient;

/// Documentation search proxy
pub const SEARCH_API_URL: &str = "https://proxy.search.docs.aws.amazon.com/search";

/// Content recommendation service
pub const RECOMMENDATIONS_API_URL: &str =
    "https://contentrecs-api.docs.aws.amazon.com/v1/recommendations";

/// Longest content excerpt forwarded to the recommendation service
const MAX_EXCERPT_CHARS: usize = 1_000;

/// Service endpoints, overridable for testing or private mirrors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsEndpoints {
    pub search_url: String,
    pub recommend_url: String,
}

impl Default for AwsEndpoints {
    fn default() -> Self {
        Self {
            search_url: SEARCH_API_URL.to_string(),
            recommend_url: RECOMMENDATIONS_API_URL.to_string(),
        }
    }
}

/// AWS documentation source
///
/// One anonymous session id is minted per instance and sent with every
/// search and recommendation request.
#[derive(Debug, Clone)]
pub struct AwsDocsSource {
    client: HttpClient,
    endpoints: AwsEndpoints,
    session_id: String,
}

impl AwsDocsSource {
    pub fn new(client: HttpClient, endpoints: AwsEndpoints) -> Self {
        Self {
            client,
            endpoints,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn endpoints(&self) -> &AwsEndpoints {
        &self.endpoints
    }

    /// Read a JSON body, degrading to `None` when it is not JSON at all
    async fn json_body(response: reqwest::Response, what: &str) -> Result<Option<Value>, SourceError> {
        let text = response.text().await?;
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(error = %err, "{} returned a non-JSON body", what);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl DocumentationSource for AwsDocsSource {
    fn id(&self) -> &str {
        "aws"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        let body = json!({
            "textQuery": { "input": query.query },
            "contextAttributes": [{ "key": "domain", "value": "docs.aws.amazon.com" }],
            "acceptSuggestionBody": "RawText",
            "locales": ["en_us"],
        });

        let url = format!(
            "{}?session={}",
            self.endpoints.search_url,
            urlencoding::encode(&self.session_id)
        );

        let response = self
            .client
            .client()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, "search documentation"))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Documentation search returned status: {}",
                response.status()
            )));
        }

        let hits = match Self::json_body(response, "Documentation search").await? {
            Some(value) => parse_search_hits(&value),
            None => Vec::new(),
        };

        tracing::debug!(query = %query.query, hits = hits.len(), "documentation search completed");
        Ok(window(hits, query))
    }

    async fn recommend(&self, target: &str) -> Result<RecommendationBuckets, SourceError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(SourceError::InvalidRequest(
                "recommendation target is empty".to_string(),
            ));
        }

        let subject = if crate::utils::looks_like_url(target) {
            ("path", target.to_string())
        } else {
            ("content", target.chars().take(MAX_EXCERPT_CHARS).collect())
        };

        let response = self
            .client
            .client()
            .get(&self.endpoints.recommend_url)
            .query(&[(subject.0, subject.1.as_str()), ("session", self.session_id.as_str())])
            .send()
            .await
            .map_err(|e| map_send_error(e, "fetch recommendations"))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Recommendation service returned status: {}",
                response.status()
            )));
        }

        Ok(match Self::json_body(response, "Recommendation service").await? {
            Some(value) => parse_recommendations(&value),
            None => RecommendationBuckets::default(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, SourceError> {
        let response = self
            .client
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| map_send_error(e, "fetch documentation page"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api(format!(
                "Failed to fetch {} - status code {}",
                url,
                status.as_u16()
            )));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read page body: {}", e)))?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn map_send_error(err: reqwest::Error, action: &str) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(format!("Failed to {}: {}", action, err))
    } else {
        SourceError::Network(format!("Failed to {}: {}", action, err))
    }
}

fn str_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Ranked hits from a search payload; unknown shapes yield nothing
fn parse_search_hits(value: &Value) -> Vec<SearchResult> {
    let items = ["suggestions", "results", "items"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default();

    items
        .iter()
        .filter_map(|item| {
            let hit = item.get("textExcerptSuggestion").unwrap_or(item);
            let url = str_field(hit, &["link", "url"])?;
            let title = str_field(hit, &["title"]).unwrap_or(url);
            let mut result = SearchResult::new(0, url, title);
            if let Some(context) = str_field(hit, &["summary", "suggestionBody", "excerpt", "context"]) {
                result = result.with_context(context);
            }
            Some(result)
        })
        .enumerate()
        .map(|(i, mut result)| {
            result.rank_order = i + 1;
            result
        })
        .collect()
}

fn bucket_items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    let bucket = value.get(key);
    bucket
        .and_then(Value::as_array)
        .or_else(|| bucket.and_then(|b| b.get("items")).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn recommendation(item: &Value, context: Option<String>) -> Option<RecommendationResult> {
    let url = str_field(item, &["url"])?;
    let title = str_field(item, &["assetTitle", "title"]).unwrap_or(url);
    let result = RecommendationResult::new(url, title);
    Some(match context {
        Some(context) if !context.is_empty() => result.with_context(context),
        _ => result,
    })
}

/// Categorised recommendations; unknown shapes yield empty buckets
fn parse_recommendations(value: &Value) -> RecommendationBuckets {
    let with_abstract = |item: &Value| {
        recommendation(item, str_field(item, &["abstract"]).map(str::to_string))
    };

    let journey = bucket_items(value, "journey")
        .iter()
        .flat_map(|group| {
            let intent = str_field(group, &["intent"]).map(|i| format!("Intent: {}", i));
            let urls = group
                .get("urls")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            urls.iter()
                .filter_map(move |item| recommendation(item, intent.clone()))
        })
        .collect();

    let new = bucket_items(value, "new")
        .iter()
        .filter_map(|item| {
            let added = str_field(item, &["dateCreated"])
                .map(|date| format!("New content added on {}", date));
            recommendation(item, added)
        })
        .collect();

    RecommendationBuckets {
        highly_rated: bucket_items(value, "highlyRated")
            .iter()
            .filter_map(with_abstract)
            .collect(),
        journey,
        new,
        similar: bucket_items(value, "similar")
            .iter()
            .filter_map(with_abstract)
            .collect(),
    }
}
