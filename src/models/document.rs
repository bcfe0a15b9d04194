//! Fetched and extracted documentation pages.

use serde::{Deserialize, Serialize};

/// Raw response from the documentation site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// `Content-Type` header, empty when the server sent none
    pub content_type: String,

    /// Response body
    pub body: String,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: String::new(),
            body: body.into(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Whether the page should go through HTML extraction
    ///
    /// The `Content-Type` header wins when present; otherwise the leading
    /// bytes of the body are sniffed.
    pub fn is_html(&self) -> bool {
        let content_type = self.content_type.to_ascii_lowercase();
        if content_type.contains("text/html") || content_type.contains("application/xhtml") {
            return true;
        }

        let head: String = self
            .body
            .trim_start()
            .chars()
            .take(100)
            .collect::<String>()
            .to_ascii_lowercase();

        head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<html")
    }
}

/// A documentation page converted to Markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub title: String,
    pub url: String,
    pub content: String,
    pub word_count: usize,
}

impl ExtractedDocument {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count();
        Self {
            title: title.into(),
            url: url.into(),
            content,
            word_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_detected_from_content_type() {
        let page = FetchedPage::new("u", "plain body").content_type("text/html; charset=utf-8");
        assert!(page.is_html());
    }

    #[test]
    fn test_html_sniffed_from_body() {
        let page = FetchedPage::new("u", "\n  <!DOCTYPE html><html><body>x</body></html>");
        assert!(page.is_html());

        let page = FetchedPage::new("u", "<?xml version=\"1.0\"?><html xmlns=\"x\"></html>");
        assert!(page.is_html());
    }

    #[test]
    fn test_non_html_passthrough() {
        let page = FetchedPage::new("u", "{\"key\": \"value\"}").content_type("application/json");
        assert!(!page.is_html());

        let page = FetchedPage::new("u", "# Already markdown");
        assert!(!page.is_html());
    }

    #[test]
    fn test_word_count() {
        let doc = ExtractedDocument::new("T", "u", "# Title\n\nthree more words");
        assert_eq!(doc.word_count, 5);
    }
}
