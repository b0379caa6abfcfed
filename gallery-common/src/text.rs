//! Text normalization for scraped descriptions.

/// Default description budget, in characters.
pub const DEFAULT_LIMIT: usize = 120;

/// A word-boundary cut is only taken when it keeps more than this many characters.
const MIN_WORD_CUT: usize = 60;

const ELLIPSIS: char = '…';

/// Collapse every run of whitespace to a single space and trim the edges.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shorten `text` to at most `limit` characters plus an ellipsis.
///
/// Whitespace is collapsed first. Text already within `limit` comes back
/// unchanged; longer text is cut on the last word boundary past character 60
/// (or hard-cut when none exists), stripped of trailing punctuation and
/// terminated with `…`.
///
/// ```
/// use gallery_common::text::shorten;
///
/// assert_eq!(shorten("  short   text ", 120), "short text");
/// let long = "word ".repeat(40);
/// let out = shorten(&long, 120);
/// assert!(out.ends_with('…'));
/// assert!(out.chars().count() <= 121);
/// ```
pub fn shorten(text: &str, limit: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= limit {
        return collapsed;
    }

    let mut cut: String = collapsed.chars().take(limit.saturating_sub(1)).collect();
    if let Some(idx) = cut.rfind(' ') {
        if cut[..idx].chars().count() > MIN_WORD_CUT {
            cut.truncate(idx);
        }
    }

    let trimmed = cut.trim_end_matches(|c: char| {
        matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '-') || c.is_whitespace()
    });
    format!("{trimmed}{ELLIPSIS}")
}
