//! Recommendation models.

use serde::{Deserialize, Serialize};

/// Default number of recommendations returned to clients
pub const DEFAULT_RECOMMENDATIONS: usize = 5;

/// A recommended documentation page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl RecommendationResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
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

/// Recommendations grouped by the category the recommendation service assigned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationBuckets {
    /// Pages readers rated highly
    pub highly_rated: Vec<RecommendationResult>,

    /// Pages commonly visited next
    pub journey: Vec<RecommendationResult>,

    /// Recently added pages
    pub new: Vec<RecommendationResult>,

    /// Pages with similar content
    pub similar: Vec<RecommendationResult>,
}

impl RecommendationBuckets {
    /// Concatenate buckets in fixed category order, then truncate
    ///
    /// Within a bucket the service order is preserved.
    pub fn merge(self, max_results: usize) -> Vec<RecommendationResult> {
        self.highly_rated
            .into_iter()
            .chain(self.journey)
            .chain(self.new)
            .chain(self.similar)
            .take(max_results)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.highly_rated.is_empty()
            && self.journey.is_empty()
            && self.new.is_empty()
            && self.similar.is_empty()
    }
}

/// Render recommendations as the numbered text block returned to clients
pub fn format_recommendations(target: &str, results: &[RecommendationResult]) -> String {
    if results.is_empty() {
        return format!("No recommendations found for {}.", target);
    }

    let mut out = format!("Recommended pages for {}:\n", target);
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   URL: {}\n", i + 1, result.title, result.url));
        if let Some(context) = &result.context {
            out.push_str(&format!("   Context: {}\n", context));
        }
    }
    out
}
