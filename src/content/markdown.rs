//! Markdown building blocks shared by both extraction strategies.
//!
//! Both strategies emit the same intermediate text: blocks separated by blank
//! lines, list continuation lines prefixed with [`INDENT`], and fenced code
//! left verbatim. [`normalize_markdown`] turns that into the final output.

/// Elements whose contents are never rendered
pub const STRIPPED_TAGS: &[&str] = &["script", "style", "noscript"];

/// Structural page chrome
pub const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside"];

/// Class or id fragments that mark page chrome on the documentation site
pub const BOILERPLATE_PATTERNS: &[&str] = &[
    "feedback",
    "breadcrumb",
    "cookie",
    "copyright",
    "prev-next",
    "page-utilities",
    "tools-panel",
];

/// Elements rendered as their own paragraph
pub const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "body",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "form",
    "li",
    "main",
    "p",
    "section",
    "summary",
];

/// Continuation marker for list items, expanded to two spaces on output
pub const INDENT: char = '\u{1}';

/// Minimum number of characters for an extraction to count as content
pub const MIN_CONTENT_CHARS: usize = 10;

/// Case-insensitive substring match against [`BOILERPLATE_PATTERNS`]
pub fn is_boilerplate_attr(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    BOILERPLATE_PATTERNS.iter().any(|pattern| value.contains(pattern))
}

/// Collapse every whitespace run to a single space, keeping edges
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else if c != INDENT {
            out.push(c);
            in_space = false;
        }
    }
    out
}

pub fn block(text: &str) -> String {
    format!("\n\n{}\n\n", text)
}

pub fn heading(level: usize, text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    format!("\n\n{} {}\n\n", "#".repeat(level.clamp(1, 6)), text)
}

/// Wrap inline text in emphasis markers, moving edge whitespace outside
pub fn wrap_inline(text: &str, marker: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return collapse_whitespace(text);
    }
    let lead = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if text.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}

pub fn inline_code(text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else if text.contains('`') {
        format!("`` {} ``", text)
    } else {
        format!("`{}`", text)
    }
}

pub fn link(text: &str, href: Option<&str>) -> String {
    let label = collapse_whitespace(text);
    let label = label.trim();
    if label.is_empty() {
        return String::new();
    }

    let lead = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if text.ends_with(char::is_whitespace) { " " } else { "" };

    match href.map(str::trim) {
        Some(href) if !href.is_empty() && !href.to_ascii_lowercase().starts_with("javascript:") => {
            format!("{lead}[{label}]({href}){trail}")
        }
        _ => format!("{lead}{label}{trail}"),
    }
}

pub fn code_block(language: Option<&str>, code: &str) -> String {
    let code = code.replace(INDENT, "").replace("\r\n", "\n");
    let code = code.trim_matches('\n').trim_end();
    if code.trim().is_empty() {
        return String::new();
    }
    format!("\n\n```{}\n{}\n```\n\n", language.unwrap_or_default(), code)
}

/// Language hint from a `language-xyz` or `lang-xyz` class
pub fn code_language(class: &str) -> Option<String> {
    class.split_whitespace().find_map(|token| {
        token
            .strip_prefix("language-")
            .or_else(|| token.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

/// Render already-converted list item bodies as a Markdown list
pub fn list_block(items: &[String], ordered: bool) -> String {
    let mut out = String::from("\n\n");
    let mut number = 1;

    for item in items {
        let mut lines = item
            .split('\n')
            .map(|line| line.trim_start_matches(char::is_whitespace).trim_end())
            .filter(|line| !line.is_empty());

        let Some(first) = lines.next() else {
            continue;
        };

        if ordered {
            out.push_str(&format!("{}. {}\n", number, first));
            number += 1;
        } else {
            out.push_str(&format!("- {}\n", first));
        }
        for line in lines {
            out.push(INDENT);
            out.push_str(line);
            out.push('\n');
        }
    }

    out.push('\n');
    out
}

pub fn clean_cell(text: &str) -> String {
    collapse_whitespace(text).trim().replace('|', "\\|")
}

pub fn table_block(rows: &[Vec<String>]) -> String {
    let rows: Vec<&Vec<String>> = rows
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();
    let Some(width) = rows.iter().map(|row| row.len()).max() else {
        return String::new();
    };

    let mut out = String::from("\n\n");
    for (i, row) in rows.iter().enumerate() {
        let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
        cells.resize(width, "");
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
        if i == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
    out.push('\n');
    out
}

/// Final cleanup of converted text
///
/// Collapses intra-line whitespace, expands [`INDENT`] markers, leaves fenced
/// code untouched, turns every run of blank lines into a single blank line
/// and trims the result.
pub fn normalize_markdown(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in raw.split('\n') {
        let depth = line.chars().take_while(|c| *c == INDENT).count();
        let body = &line[depth * INDENT.len_utf8()..];
        let indent = "  ".repeat(depth);

        if body.trim_start().starts_with("```") {
            in_fence = !in_fence;
            lines.push(format!("{}{}", indent, body.trim()));
            continue;
        }

        if in_fence {
            lines.push(format!("{}{}", indent, body.trim_end()));
            continue;
        }

        let cleaned = collapse_whitespace(body);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            if lines.last().is_some_and(|prev| prev.is_empty()) {
                continue;
            }
            lines.push(String::new());
        } else {
            lines.push(format!("{}{}", indent, cleaned));
        }
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boilerplate_attr() {
        assert!(is_boilerplate_attr("awsdocs-page-utilities"));
        assert!(is_boilerplate_attr("Feedback-Widget"));
        assert!(!is_boilerplate_attr("main-content"));
    }

    #[test]
    fn test_wrap_inline_moves_spaces_outside() {
        assert_eq!(wrap_inline(" bold ", "**"), " **bold** ");
        assert_eq!(wrap_inline("   ", "*"), " ");
    }

    #[test]
    fn test_link_drops_script_targets() {
        assert_eq!(link("Guide", Some("/guide.html")), "[Guide](/guide.html)");
        assert_eq!(link("Click", Some("javascript:void(0)")), "Click");
        assert_eq!(link("  ", Some("/x")), "");
    }

    #[test]
    fn test_list_block_nests_with_indent() {
        let inner = list_block(&["child".to_string()], false);
        let outer = list_block(&[format!("parent{}", inner), "second".to_string()], true);
        let rendered = normalize_markdown(&outer);
        assert_eq!(rendered, "1. parent\n  - child\n2. second");
    }

    #[test]
    fn test_table_block() {
        let rows = vec![
            vec!["Name".to_string(), "Value".to_string()],
            vec!["a|b".to_string()],
        ];
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|r| r.iter().map(|c| clean_cell(c)).collect())
            .collect();
        assert_eq!(
            normalize_markdown(&table_block(&rows)),
            "| Name | Value |\n| --- | --- |\n| a\\|b | |"
        );
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let raw = "\n\n# Title\n\n\n\n\nBody   text\n\n\n";
        assert_eq!(normalize_markdown(raw), "# Title\n\nBody text");
    }

    #[test]
    fn test_normalize_preserves_fenced_code() {
        let raw = format!("intro{}", code_block(Some("json"), "{\n    \"a\":   1\n\n}"));
        assert_eq!(
            normalize_markdown(&raw),
            "intro\n\n```json\n{\n    \"a\":   1\n\n}\n```"
        );
    }

    #[test]
    fn test_code_language() {
        assert_eq!(code_language("prettyprint language-python"), Some("python".into()));
        assert_eq!(code_language("programlisting"), None);
    }
}
