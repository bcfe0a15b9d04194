//! Structural extraction over a parsed DOM.

use scraper::{ElementRef, Html, Node, Selector};

use super::markdown::{
    block, clean_cell, code_block, code_language, collapse_whitespace, heading, inline_code,
    is_boilerplate_attr, link, list_block, normalize_markdown, table_block, wrap_inline,
    BLOCK_TAGS, BOILERPLATE_TAGS, INDENT, STRIPPED_TAGS,
};
use super::{finish, ContentExtractor, ExtractError, Extraction, MAIN_CONTENT_SELECTORS};

/// Walks the document tree with `scraper`, skipping chrome as it goes
#[derive(Debug)]
pub struct DomExtractor {
    candidates: Vec<Selector>,
    title: Option<Selector>,
    first_heading: Option<Selector>,
}

impl DomExtractor {
    pub fn new() -> Self {
        Self {
            candidates: MAIN_CONTENT_SELECTORS
                .iter()
                .filter_map(|css| Selector::parse(css).ok())
                .collect(),
            title: Selector::parse("title").ok(),
            first_heading: Selector::parse("h1").ok(),
        }
    }

    fn title(&self, document: &Html) -> Option<String> {
        [&self.title, &self.first_heading]
            .into_iter()
            .flatten()
            .find_map(|selector| {
                let element = document.select(selector).next()?;
                let text = collapse_whitespace(&element.text().collect::<String>());
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            })
    }

    /// Page-level wrappers and main-content candidates are never chrome by class or id
    fn is_container(&self, element: ElementRef<'_>) -> bool {
        element.value().name() == "html"
            || self.candidates.iter().any(|selector| selector.matches(&element))
    }

    fn is_chrome(&self, element: ElementRef<'_>) -> bool {
        let value = element.value();
        if BOILERPLATE_TAGS.contains(&value.name()) {
            return true;
        }
        if self.is_container(element) {
            return false;
        }
        value.attr("class").is_some_and(is_boilerplate_attr)
            || value.attr("id").is_some_and(is_boilerplate_attr)
    }

    /// True when the element or one of its ancestors is chrome
    fn within_chrome(&self, element: ElementRef<'_>) -> bool {
        std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .any(|node| self.is_chrome(node))
    }

    fn render_children(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(&collapse_whitespace(&text.replace(INDENT, ""))),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        out.push_str(&self.render_element(child));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn render_element(&self, element: ElementRef<'_>) -> String {
        let tag = element.value().name();
        if STRIPPED_TAGS.contains(&tag) || self.is_chrome(element) {
            return String::new();
        }

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse().unwrap_or(1);
                heading(level, &self.render_children(element))
            }
            "br" => "\n".to_string(),
            "hr" => "\n\n---\n\n".to_string(),
            "pre" => {
                let language = element
                    .value()
                    .attr("class")
                    .and_then(code_language)
                    .or_else(|| {
                        element
                            .children()
                            .filter_map(ElementRef::wrap)
                            .find(|child| child.value().name() == "code")
                            .and_then(|code| code.value().attr("class"))
                            .and_then(code_language)
                    });
                code_block(language.as_deref(), &element.text().collect::<String>())
            }
            "code" | "kbd" | "samp" | "tt" => inline_code(&element.text().collect::<String>()),
            "a" => link(&self.render_children(element), element.value().attr("href")),
            "strong" | "b" => wrap_inline(&self.render_children(element), "**"),
            "em" | "i" => wrap_inline(&self.render_children(element), "*"),
            "ul" => self.render_list(element, false),
            "ol" => self.render_list(element, true),
            "table" => self.render_table(element),
            _ if BLOCK_TAGS.contains(&tag) => block(&self.render_children(element)),
            _ => self.render_children(element),
        }
    }

    fn render_list(&self, list: ElementRef<'_>, ordered: bool) -> String {
        let items: Vec<String> = list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|item| item.value().name() == "li" && !self.is_chrome(*item))
            .map(|item| self.render_children(item))
            .collect();
        list_block(&items, ordered)
    }

    fn render_table(&self, table: ElementRef<'_>) -> String {
        let rows: Vec<Vec<String>> = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|row| row.value().name() == "tr" && !self.is_chrome(*row))
            .map(|row| {
                row.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                    .map(|cell| clean_cell(&self.render_children(cell)))
                    .collect()
            })
            .collect();
        table_block(&rows)
    }
}

impl Default for DomExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentExtractor for DomExtractor {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn extract(&self, html: &str) -> Result<Extraction, ExtractError> {
        let document = Html::parse_document(html);
        let title = self.title(&document);

        let mut markdown = String::new();
        for selector in &self.candidates {
            let root = document
                .select(selector)
                .find(|element| !self.within_chrome(*element));
            if let Some(root) = root {
                markdown = normalize_markdown(&self.render_children(root));
                if !markdown.is_empty() {
                    break;
                }
            }
        }

        finish(title, markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Extraction {
        DomExtractor::new().extract(html).unwrap()
    }

    #[test]
    fn test_prefers_main_over_body() {
        let html = r#"<html><body>
            <div>Sidebar text outside of main</div>
            <main><h1>Welcome</h1><p>This is the main body of the page.</p></main>
        </body></html>"#;

        let result = extract(html);
        assert_eq!(result.markdown, "# Welcome\n\nThis is the main body of the page.");
    }

    #[test]
    fn test_strips_scripts_and_chrome() {
        let html = r#"<html><head><title>Guide</title><style>p { color: red }</style></head><body>
            <header>Site header</header>
            <nav>Navigation</nav>
            <div id="main-content">
              <div class="breadcrumb">Home &gt; Guide</div>
              <p>Real content lives here.</p>
              <script>var tracking = true;</script>
              <div class="awsdocs-page-utilities">Utilities</div>
              <div id="feedback">Was this page helpful?</div>
            </div>
            <footer>Copyright</footer>
        </body></html>"#;

        let result = extract(html);
        assert_eq!(result.title.as_deref(), Some("Guide"));
        assert_eq!(result.markdown, "Real content lives here.");
    }

    #[test]
    fn test_inline_formatting() {
        let html = r#"<main><p>Use <code>aws s3 ls</code> to list <strong>all</strong> buckets,
            see <a href="https://docs.aws.amazon.com/cli/">the <em>CLI</em> guide</a>.</p></main>"#;

        let result = extract(html);
        assert_eq!(
            result.markdown,
            "Use `aws s3 ls` to list **all** buckets, see [the *CLI* guide](https://docs.aws.amazon.com/cli/)."
        );
    }

    #[test]
    fn test_lists_and_code_blocks() {
        let html = r#"<article>
            <h2>Steps</h2>
            <ol><li>Open the console</li><li>Create a bucket<ul><li>Pick a region</li></ul></li></ol>
            <pre class="language-bash">aws s3 mb s3://example
aws s3 ls</pre>
        </article>"#;

        let result = extract(html);
        assert_eq!(
            result.markdown,
            "## Steps\n\n1. Open the console\n2. Create a bucket\n  - Pick a region\n\n```bash\naws s3 mb s3://example\naws s3 ls\n```"
        );
    }

    #[test]
    fn test_candidate_inside_chrome_is_skipped() {
        let html = r#"<body>
            <nav><main><p>Menu entries that are not content.</p></main></nav>
            <article><p>Article text that matters here.</p></article>
        </body>"#;

        assert_eq!(extract(html).markdown, "Article text that matters here.");
    }

    #[test]
    fn test_container_class_does_not_hide_content() {
        let html = r#"<div id="main-content" class="with-feedback-widget">
            <p>Guide text with enough words.</p>
            <div class="awsdocs-feedback">Was this helpful?</div>
        </div>"#;

        assert_eq!(extract(html).markdown, "Guide text with enough words.");
    }

    #[test]
    fn test_empty_page_is_content_empty() {
        let err = DomExtractor::new()
            .extract("<html><body><nav>only navigation</nav></body></html>")
            .unwrap_err();
        assert!(matches!(err, ExtractError::ContentEmpty { .. }));
    }
}
