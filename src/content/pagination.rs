//! Windowed delivery of long page content.
//!
//! Offsets count characters, not bytes, so a window never splits a UTF-8
//! sequence. Concatenating the slices of consecutive windows reproduces the
//! content exactly.

/// Default window size for documentation reads
pub const DEFAULT_MAX_LENGTH: usize = 50_000;

/// One window over a piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    pub slice: &'a str,
    pub start_index: usize,
    /// Offset to request next, absent on the last window
    pub next_index: Option<usize>,
    pub total_length: usize,
}

/// Cut the window `[start_index, start_index + max_length)` out of `content`
///
/// Returns `None` once `start_index` is at or past the end.
pub fn paginate(content: &str, start_index: usize, max_length: usize) -> Option<Page<'_>> {
    let total_length = content.chars().count();
    if start_index >= total_length {
        return None;
    }

    let end_index = start_index
        .saturating_add(max_length.max(1))
        .min(total_length);
    let start = byte_offset(content, start_index);
    let end = byte_offset(content, end_index);

    Some(Page {
        slice: &content[start..end],
        start_index,
        next_index: (end_index < total_length).then_some(end_index),
        total_length,
    })
}

/// Render a window as the text returned by `read_documentation`
pub fn format_page(url: &str, content: &str, start_index: usize, max_length: usize) -> String {
    let Some(page) = paginate(content, start_index, max_length) else {
        return format!("<e>No more content available for {}.</e>", url);
    };

    let mut out = format!("AWS Documentation from {}:\n\n{}", url, page.slice);
    if let Some(next) = page.next_index {
        out.push_str(&format!(
            "\n\n<e>Content truncated. Call the read_documentation tool with start_index={} to get more content.</e>",
            next
        ));
    }
    out
}

fn byte_offset(content: &str, char_index: usize) -> usize {
    content
        .char_indices()
        .nth(char_index)
        .map(|(offset, _)| offset)
        .unwrap_or(content.len())
}
