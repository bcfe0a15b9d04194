//! Textual extraction with regular expressions over the raw markup.
//!
//! No DOM is built. Elements are located by scanning tags and matching
//! nesting depth, then converted in a fixed order: code, emphasis, links,
//! headings, tables, lists, blocks.

use regex::{Captures, Regex};

use super::markdown::{
    clean_cell, code_block, code_language, collapse_whitespace, heading, inline_code,
    is_boilerplate_attr, link, list_block, normalize_markdown, table_block, wrap_inline,
    BLOCK_TAGS, BOILERPLATE_TAGS, STRIPPED_TAGS,
};
use super::{finish, ContentExtractor, ExtractError, Extraction};

/// Placeholder delimiter for protected `<pre>` blocks
const PRE_MARK: char = '\u{2}';

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// How a main-content candidate is recognised from an opening tag
#[derive(Debug, Clone, Copy)]
enum Candidate {
    Tag(&'static str),
    Id(&'static str),
    ClassContains(&'static str),
}

/// Same order as the structural strategy's selectors
const CANDIDATES: &[Candidate] = &[
    Candidate::Tag("main"),
    Candidate::Tag("article"),
    Candidate::Id("main-content"),
    Candidate::ClassContains("main-content"),
    Candidate::Id("awsdocs-content"),
    Candidate::ClassContains("awsui-article"),
    Candidate::Tag("body"),
];

/// Regex-driven HTML to Markdown conversion
#[derive(Debug)]
pub struct TextExtractor {
    tag: Regex,
    attr: Regex,
    comment: Regex,
    raw_blocks: Vec<Regex>,
    head: Regex,
    title: Regex,
    h1: Regex,
    pre: Regex,
    code: Regex,
    strong: Regex,
    em: Regex,
    anchor: Regex,
    heading: Regex,
    table: Regex,
    row: Regex,
    cell: Regex,
    list_open: Regex,
    list_close: Regex,
    list_item: Regex,
    list_item_close: Regex,
    line_break: Regex,
    rule: Regex,
    block_tag: Regex,
    any_tag: Regex,
    entity: Regex,
    pre_placeholder: Regex,
}

impl TextExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        let raw_blocks = STRIPPED_TAGS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tag: Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)([^>]*?)(/?)>")?,
            attr: Regex::new(
                r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
            )?,
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            raw_blocks,
            head: Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>")?,
            title: Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>")?,
            h1: Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>")?,
            pre: Regex::new(r"(?is)<pre\b([^>]*)>(.*?)</pre\s*>")?,
            code: Regex::new(r"(?is)<(?:code|kbd|samp|tt)\b[^>]*>(.*?)</(?:code|kbd|samp|tt)\s*>")?,
            strong: Regex::new(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>")?,
            em: Regex::new(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)\s*>")?,
            anchor: Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>")?,
            heading: Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>")?,
            table: Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>")?,
            row: Regex::new(r"(?is)<tr\b([^>]*)>(.*?)</tr\s*>")?,
            cell: Regex::new(r"(?is)<t[hd]\b[^>]*>(.*?)</t[hd]\s*>")?,
            list_open: Regex::new(r"(?i)<(ul|ol)\b[^>]*>")?,
            list_close: Regex::new(r"(?i)</(?:ul|ol)\s*>")?,
            list_item: Regex::new(r"(?i)<li\b[^>]*>")?,
            list_item_close: Regex::new(r"(?i)</li\s*>")?,
            line_break: Regex::new(r"(?i)<br\b[^>]*>")?,
            rule: Regex::new(r"(?i)<hr\b[^>]*>")?,
            block_tag: Regex::new(&format!(r"(?i)</?(?:{})\b[^>]*>", BLOCK_TAGS.join("|")))?,
            any_tag: Regex::new(r"<[^>]*>")?,
            entity: Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]*);")?,
            pre_placeholder: Regex::new(&format!(r"{PRE_MARK}(\d+){PRE_MARK}"))?,
        })
    }

    fn attribute(&self, attrs: &str, name: &str) -> Option<String> {
        self.attr.captures_iter(attrs).find_map(|caps| {
            if !caps[1].eq_ignore_ascii_case(name) {
                return None;
            }
            caps.get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
        })
    }

    /// Byte range of the closing tag that balances an element opened before `from`
    fn closing_tag(&self, html: &str, name: &str, from: usize) -> Option<(usize, usize)> {
        let mut depth = 1usize;
        for caps in self.tag.captures_iter(&html[from..]) {
            if !caps[2].eq_ignore_ascii_case(name) {
                continue;
            }
            let whole = caps.get(0)?;
            if !caps[1].is_empty() {
                depth -= 1;
                if depth == 0 {
                    return Some((from + whole.start(), from + whole.end()));
                }
            } else if caps[4].is_empty() {
                depth += 1;
            }
        }
        None
    }

    /// Drop every element whose opening tag matches, together with its subtree
    fn remove_elements<F>(&self, html: &str, should_remove: F) -> String
    where
        F: Fn(&str, &str) -> bool,
    {
        let mut out = String::with_capacity(html.len());
        let mut pos = 0;

        while let Some(caps) = self.tag.captures_at(html, pos) {
            let Some(whole) = caps.get(0) else {
                break;
            };
            let name = caps[2].to_ascii_lowercase();
            let opening = caps[1].is_empty();

            if opening && should_remove(&name, &caps[3]) {
                out.push_str(&html[pos..whole.start()]);
                let self_closing = !caps[4].is_empty() || VOID_TAGS.contains(&name.as_str());
                pos = if self_closing {
                    whole.end()
                } else {
                    self.closing_tag(html, &name, whole.end())
                        .map(|(_, end)| end)
                        .unwrap_or(whole.end())
                };
            } else {
                out.push_str(&html[pos..whole.end()]);
                pos = whole.end();
            }
        }

        out.push_str(&html[pos..]);
        out
    }

    /// Page-level wrappers and main-content candidates are never chrome by class or id
    fn is_container(&self, name: &str, attrs: &str) -> bool {
        name == "html"
            || CANDIDATES
                .iter()
                .any(|candidate| self.matches_candidate(*candidate, name, attrs))
    }

    fn is_chrome(&self, name: &str, attrs: &str) -> bool {
        if BOILERPLATE_TAGS.contains(&name) {
            return true;
        }
        !self.is_container(name, attrs)
            && ["class", "id"].iter().any(|key| {
                self.attribute(attrs, key)
                    .is_some_and(|value| is_boilerplate_attr(&value))
            })
    }

    // Case-sensitive, like the `[class*=..]` selectors of the structural strategy.
    // Chrome patterns are the only case-insensitive attribute test.
    fn matches_candidate(&self, candidate: Candidate, name: &str, attrs: &str) -> bool {
        match candidate {
            Candidate::Tag(tag) => name == tag,
            Candidate::Id(id) => self.attribute(attrs, "id").is_some_and(|value| value == id),
            Candidate::ClassContains(fragment) => self
                .attribute(attrs, "class")
                .is_some_and(|value| value.contains(fragment)),
        }
    }

    /// Inner markup of the first element matching the candidate
    fn candidate_content<'a>(&self, html: &'a str, candidate: Candidate) -> Option<&'a str> {
        for caps in self.tag.captures_iter(html) {
            if !caps[1].is_empty() {
                continue;
            }
            let name = caps[2].to_ascii_lowercase();
            if !self.matches_candidate(candidate, &name, &caps[3]) {
                continue;
            }
            let whole = caps.get(0)?;
            let inner_end = self
                .closing_tag(html, &name, whole.end())
                .map(|(start, _)| start)
                .unwrap_or(html.len());
            return Some(&html[whole.end()..inner_end]);
        }
        None
    }

    fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures<'_>| {
                decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn strip_tags(&self, html: &str) -> String {
        self.any_tag.replace_all(html, "").into_owned()
    }

    /// Blocks to blank-line separated text, remaining tags removed
    fn flatten(&self, html: &str) -> String {
        let html = self.line_break.replace_all(html, "\n");
        let html = self.rule.replace_all(&html, "\n\n---\n\n");
        let html = self.block_tag.replace_all(&html, "\n\n");
        self.strip_tags(&html)
    }

    fn title(&self, html: &str) -> Option<String> {
        [&self.title, &self.h1].into_iter().find_map(|re| {
            let inner = re.captures(html)?.get(1)?.as_str();
            let text = collapse_whitespace(&self.decode_entities(&self.strip_tags(inner)));
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }

    fn render_lists(&self, mut html: String) -> String {
        // Innermost first: the last opening list tag never contains another list.
        loop {
            let Some((start, body_start, ordered)) =
                self.list_open.captures_iter(&html).last().and_then(|open| {
                    let whole = open.get(0)?;
                    Some((whole.start(), whole.end(), open[1].eq_ignore_ascii_case("ol")))
                })
            else {
                break;
            };

            let close = self
                .list_close
                .find_at(&html, body_start)
                .map(|m| (m.start(), m.end()));
            let Some((close_start, close_end)) = close else {
                html.replace_range(start..body_start, "");
                continue;
            };

            let body = &html[body_start..close_start];
            let items: Vec<String> = self
                .list_item
                .split(body)
                .skip(1)
                .map(|item| self.flatten(&self.list_item_close.replace_all(item, "")))
                .collect();

            let rendered = list_block(&items, ordered);
            html.replace_range(start..close_end, &rendered);
        }
        html
    }

    fn render_tables(&self, html: &str) -> String {
        self.table
            .replace_all(html, |caps: &Captures<'_>| {
                let rows: Vec<Vec<String>> = self
                    .row
                    .captures_iter(&caps[1])
                    .filter(|row| !self.is_chrome("tr", &row[1]))
                    .map(|row| {
                        self.cell
                            .captures_iter(&row[2])
                            .map(|cell| clean_cell(&self.flatten(&cell[1])))
                            .collect()
                    })
                    .collect();
                table_block(&rows)
            })
            .into_owned()
    }

    fn convert(&self, html: &str) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let html = self
            .pre
            .replace_all(html, |caps: &Captures<'_>| {
                let language = self
                    .attribute(&caps[1], "class")
                    .and_then(|class| code_language(&class))
                    .or_else(|| {
                        let inner_open = self.tag.captures(&caps[2])?;
                        if !inner_open[2].eq_ignore_ascii_case("code") {
                            return None;
                        }
                        self.attribute(&inner_open[3], "class")
                            .and_then(|class| code_language(&class))
                    });
                let code = self.decode_entities(&self.strip_tags(&caps[2]));
                blocks.push(code_block(language.as_deref(), &code));
                format!("\n\n{PRE_MARK}{}{PRE_MARK}\n\n", blocks.len() - 1)
            })
            .into_owned();

        let html = collapse_whitespace(&html);

        let html = self.code.replace_all(&html, |caps: &Captures<'_>| {
            inline_code(&self.strip_tags(&caps[1]))
        });
        let html = self
            .strong
            .replace_all(&html, |caps: &Captures<'_>| wrap_inline(&caps[1], "**"));
        let html = self
            .em
            .replace_all(&html, |caps: &Captures<'_>| wrap_inline(&caps[1], "*"));
        let html = self.anchor.replace_all(&html, |caps: &Captures<'_>| {
            let href = self
                .attribute(&caps[1], "href")
                .map(|href| self.decode_entities(&href));
            link(&self.flatten(&caps[2]), href.as_deref())
        });
        let html = self.heading.replace_all(&html, |caps: &Captures<'_>| {
            let level = caps[1].parse().unwrap_or(1);
            heading(level, &self.flatten(&caps[2]))
        });

        let html = self.render_tables(&html);
        let html = self.render_lists(html);
        let text = self.decode_entities(&self.flatten(&html));

        let text = self
            .pre_placeholder
            .replace_all(&text, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| blocks.get(i).cloned())
                    .unwrap_or_default()
            })
            .into_owned();

        normalize_markdown(&text)
    }
}

impl ContentExtractor for TextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, html: &str) -> Result<Extraction, ExtractError> {
        let title = self.title(html);

        let mut cleaned = self.comment.replace_all(html, "").into_owned();
        for raw in &self.raw_blocks {
            cleaned = raw.replace_all(&cleaned, "").into_owned();
        }
        let cleaned = self.head.replace_all(&cleaned, "");
        let cleaned = self.remove_elements(&cleaned, |name, attrs| self.is_chrome(name, attrs));

        let mut markdown = String::new();
        for candidate in CANDIDATES {
            if let Some(content) = self.candidate_content(&cleaned, *candidate) {
                markdown = self.convert(content);
                if !markdown.is_empty() {
                    break;
                }
            }
        }
        if markdown.is_empty() && self.candidate_content(&cleaned, Candidate::Tag("body")).is_none() {
            markdown = self.convert(&cleaned);
        }

        finish(title, markdown)
    }
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "rarr" => "\u{2192}",
        "larr" => "\u{2190}",
        "times" => "\u{d7}",
        "bull" => "\u{2022}",
        _ => return None,
    };
    Some(decoded.to_string())
}
