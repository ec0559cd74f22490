//! Shared text-normalization utilities.
//!
//! Two passes are kept apart on purpose: [`normalize_document`] rewrites the
//! raw document so that heading detection is purely textual, and
//! [`strip_markup`] cleans the payload of an individual chunk. Offsets are
//! always taken against the output of [`normalize_document`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

static BR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static HEADING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h([1-6])[^>]*>(.*?)</h([1-6])>").unwrap());
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NBSP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)&nbsp;").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize line endings and rewrite `<hN>` tags into `#` headings.
///
/// `<br>` tags become newlines. An `<hN>…</hN>` pair becomes its own line of
/// `N` hash marks followed by the stripped inner text. Everything else is
/// left untouched, so that heading boundaries can still be found in the raw
/// text.
pub fn normalize_document(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = BR_TAG_RE.replace_all(&text, "\n");
    HEADING_TAG_RE
        .replace_all(&text, |caps: &Captures| {
            if caps[1] != caps[3] {
                return caps[0].to_string();
            }
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n{} {}\n", "#".repeat(level), strip_markup(&caps[2]))
        })
        .into_owned()
}

/// Strip inline markup noise and collapse whitespace.
///
/// `<br>` tags and other tags become whitespace, `&nbsp;` becomes a space,
/// and every whitespace run collapses to a single space. The result is
/// trimmed. The output is never longer than the input.
pub fn strip_markup(text: &str) -> String {
    let text = BR_TAG_RE.replace_all(text, "\n");
    let text = ANY_TAG_RE.replace_all(&text, " ");
    let text = NBSP_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Number of characters (not bytes) in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The longest prefix of `text` holding at most `max_chars` characters.
pub fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Byte index just past the character starting at `index`.
pub fn next_char_boundary(s: &str, index: usize) -> usize {
    s[index..]
        .chars()
        .next()
        .map(|c| index + c.len_utf8())
        .unwrap_or(s.len())
}
