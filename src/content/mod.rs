//! HTML to Markdown conversion and paginated delivery of page content.
//!
//! Two interchangeable strategies implement [`ContentExtractor`]:
//!
//! - [`DomExtractor`]: parses the page with `scraper` and walks the tree
//! - [`TextExtractor`]: works on the raw markup with regular expressions
//!
//! Both apply the same chrome removal and main-content selection rules and
//! share the Markdown helpers in [`markdown`], so they produce the same
//! headings, links and code blocks for a given page. The strategy is picked
//! by configuration, see [`ExtractionStrategy`].

mod dom;
pub mod markdown;
mod pagination;
mod text;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::ExtractedDocument;

pub use dom::DomExtractor;
pub use pagination::{format_page, paginate, Page, DEFAULT_MAX_LENGTH};
pub use text::TextExtractor;

use markdown::MIN_CONTENT_CHARS;

/// Main-content candidates, tried in order; the first non-empty one wins
pub const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#main-content",
    "[class*=\"main-content\"]",
    "#awsdocs-content",
    "[class*=\"awsui-article\"]",
    "body",
];

/// Errors raised while converting a page
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Conversion left (almost) nothing behind
    #[error("extracted content is empty ({length} characters after conversion)")]
    ContentEmpty { length: usize },

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Successful conversion of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub title: Option<String>,
    pub markdown: String,
}

/// An HTML to Markdown conversion strategy
pub trait ContentExtractor: Send + Sync + std::fmt::Debug {
    /// Short strategy name used in logs
    fn name(&self) -> &'static str;

    /// Convert a full HTML document
    ///
    /// Deterministic: the same input always yields the same output.
    fn extract(&self, html: &str) -> Result<Extraction, ExtractError>;
}

/// Which extractor to run, chosen by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// Structural conversion over a parsed DOM
    #[default]
    Dom,
    /// Regex conversion over raw markup
    Text,
}

impl ExtractionStrategy {
    pub fn build(self) -> Result<Arc<dyn ContentExtractor>, ExtractError> {
        Ok(match self {
            ExtractionStrategy::Dom => Arc::new(DomExtractor::new()),
            ExtractionStrategy::Text => Arc::new(TextExtractor::new()?),
        })
    }
}

impl std::str::FromStr for ExtractionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dom" | "structural" => Ok(ExtractionStrategy::Dom),
            "text" | "textual" | "regex" => Ok(ExtractionStrategy::Text),
            other => Err(format!("unknown extraction strategy: {}", other)),
        }
    }
}

pub(crate) fn finish(title: Option<String>, markdown: String) -> Result<Extraction, ExtractError> {
    let length = markdown.chars().count();
    if length < MIN_CONTENT_CHARS {
        return Err(ExtractError::ContentEmpty { length });
    }
    Ok(Extraction { title, markdown })
}

/// Diagnostic text returned in place of a page that converted to nothing
pub fn empty_content_placeholder(raw_length: usize) -> String {
    format!(
        "<e>Page failed to be simplified from HTML ({} bytes received). The page may be rendered client-side or contain no readable text.</e>",
        raw_length
    )
}

/// Convert a fetched page, degrading to the diagnostic placeholder
///
/// An empty conversion is reported inside the document text rather than as a
/// failure so callers always get something to show.
pub fn extract_document(
    extractor: &dyn ContentExtractor,
    url: &str,
    html: &str,
) -> ExtractedDocument {
    match extractor.extract(html) {
        Ok(extraction) => {
            ExtractedDocument::new(extraction.title.unwrap_or_default(), url, extraction.markdown)
        }
        Err(err) => {
            tracing::warn!(url, strategy = extractor.name(), error = %err, "page produced no content");
            ExtractedDocument::new("", url, empty_content_placeholder(html.len()))
        }
    }
}
