//! Context budget assembly.
//!
//! Turns ranked chunks and prior conversation turns into the two
//! character-budgeted blocks that go into a language-model request: the
//! source context and the history window. Both functions are pure and
//! deterministic; lengths are counted in characters.

use crate::models::{ConversationTurn, ScoredChunk};
use crate::text::{char_len, prefix_chars};

/// Default character budget for the source context block.
pub const MAX_CONTEXT_CHARS: usize = 12_000;

/// Per-chunk cap on the text included in the source context.
pub const MAX_CHUNK_TEXT: usize = 2_000;

/// Appended when a chunk's text was cut to fit.
pub const TRUNCATION_MARKER: &str = "\n... [truncated to limit tokens]";

/// Returned instead of a context block when nothing was retrieved.
pub const NO_SOURCES: &str = "No source fragments were found for this question. \
Answer that this is not specified in the provided books.";

const CONTEXT_PREAMBLE: &str = "The following text fragments are excerpts from the user's D&D sources.\n\
Use only this text as a source:";

const CONTEXT_CLOSING: &str = "End of source fragments.";

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let prefix = prefix_chars(text, max_chars);
    if prefix.len() == text.len() {
        text.to_string()
    } else {
        format!("{}{}", prefix, TRUNCATION_MARKER)
    }
}

/// Render the source-context block with the default per-chunk cap.
///
/// See [`build_context_with_cap`].
pub fn build_context(chunks: &[ScoredChunk<'_>], char_budget: usize) -> String {
    build_context_with_cap(chunks, char_budget, MAX_CHUNK_TEXT)
}

/// Render the source-context block.
///
/// Chunks are taken in the given order. Each becomes a citation header
/// (`[SOURCE i – file – heading]`) followed by its trimmed text, cut to
/// `min(chunk_cap, remaining budget)` characters. The rendered block's
/// length is charged against the budget; the block that drives the budget
/// to zero or below is dropped and assembly stops.
///
/// An empty `chunks` slice yields [`NO_SOURCES`].
pub fn build_context_with_cap(chunks: &[ScoredChunk<'_>], char_budget: usize, chunk_cap: usize) -> String {
    if chunks.is_empty() {
        return NO_SOURCES.to_string();
    }

    let mut budget = char_budget as i64;
    let mut blocks: Vec<String> = Vec::new();

    for (i, item) in chunks.iter().enumerate() {
        let heading = item
            .chunk
            .heading
            .as_deref()
            .map(|h| format!(" – {}", h))
            .unwrap_or_default();
        let limit = chunk_cap.min(budget.max(0) as usize);
        let text = truncate_text(item.chunk.text.trim(), limit);
        let block = format!("[SOURCE {} – {}{}]\n{}", i + 1, item.chunk.file_name, heading, text);

        budget -= char_len(&block) as i64;
        if budget <= 0 {
            break;
        }
        blocks.push(block);
    }

    format!(
        "{}\n\n{}\n\n{}",
        CONTEXT_PREAMBLE,
        blocks.join("\n\n"),
        CONTEXT_CLOSING
    )
}

/// Select the most recent turns whose content fits in `char_budget`.
///
/// Walks from newest to oldest and stops at the first turn that would
/// overflow, so the result is always a contiguous recency window. Returned
/// in chronological order.
pub fn build_history(turns: &[ConversationTurn], char_budget: usize) -> Vec<ConversationTurn> {
    let mut selected = Vec::new();
    let mut used = 0usize;

    for turn in turns.iter().rev() {
        let len = char_len(&turn.content);
        if used + len > char_budget {
            break;
        }
        selected.push(turn.clone());
        used += len;
    }

    selected.reverse();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use proptest::prelude::*;

    fn make_chunk(idx: i64, heading: Option<&str>, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", idx),
            document_id: "d1".to_string(),
            file_name: "phb.md".to_string(),
            chunk_index: idx,
            heading: heading.map(str::to_string),
            start_offset: 0,
            end_offset: text.len(),
            text: text.to_string(),
        }
    }

    fn scored(chunks: &[Chunk]) -> Vec<ScoredChunk<'_>> {
        chunks
            .iter()
            .map(|chunk| ScoredChunk { chunk, score: 1.0 })
            .collect()
    }

    #[test]
    fn test_empty_chunks_sentinel() {
        assert_eq!(build_context(&[], 12_000), NO_SOURCES);
        assert!(!NO_SOURCES.is_empty());
    }

    #[test]
    fn test_headers_and_wrapper() {
        let chunks = vec![
            make_chunk(0, Some("Stealth"), "Hide well."),
            make_chunk(1, None, "No heading here."),
        ];
        let out = build_context(&scored(&chunks), 12_000);
        assert!(out.starts_with(CONTEXT_PREAMBLE));
        assert!(out.ends_with(CONTEXT_CLOSING));
        assert!(out.contains("[SOURCE 1 – phb.md – Stealth]\nHide well."));
        assert!(out.contains("[SOURCE 2 – phb.md]\nNo heading here."));
        assert!(!out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn test_long_chunk_truncated_with_marker() {
        let chunks = vec![make_chunk(0, None, &"x".repeat(5000))];
        let out = build_context(&scored(&chunks), 12_000);
        assert!(out.contains(TRUNCATION_MARKER));
        assert!(!out.contains(&"x".repeat(MAX_CHUNK_TEXT + 1)));
        assert!(out.contains(&"x".repeat(MAX_CHUNK_TEXT)));
    }

    #[test]
    fn test_budget_stops_inclusion() {
        let chunks: Vec<Chunk> = (0..10).map(|i| make_chunk(i, None, &"y".repeat(1000))).collect();
        let out = build_context(&scored(&chunks), 3_500);
        assert!(out.contains("[SOURCE 3 "));
        assert!(!out.contains("[SOURCE 4 "));
    }

    #[test]
    fn test_zero_budget_has_no_blocks() {
        let chunks = vec![make_chunk(0, None, "text")];
        let out = build_context(&scored(&chunks), 0);
        assert!(!out.contains("[SOURCE"));
        assert_ne!(out, NO_SOURCES);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 3), format!("abc{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_history_keeps_recent_in_order() {
        let turns = vec![
            ConversationTurn::user("aaaa"),
            ConversationTurn::assistant("bbbb"),
            ConversationTurn::user("cccc"),
        ];
        let kept = build_history(&turns, 8);
        let contents: Vec<&str> = kept.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["bbbb", "cccc"]);
    }

    #[test]
    fn test_history_is_contiguous_not_knapsack() {
        let turns = vec![
            ConversationTurn::user("a"),
            ConversationTurn::assistant(&"long".repeat(100)),
            ConversationTurn::user("recent"),
        ];
        let kept = build_history(&turns, 50);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "recent");
    }

    #[test]
    fn test_history_empty_when_newest_overflows() {
        let turns = vec![ConversationTurn::user("x"), ConversationTurn::user("too long")];
        assert!(build_history(&turns, 3).is_empty());
    }

    proptest! {
        #[test]
        fn context_blocks_fit_budget(
            texts in proptest::collection::vec("[a-z ]{1,3000}", 1..8),
            budget in 0usize..15_000,
        ) {
            let chunks: Vec<Chunk> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| make_chunk(i as i64, Some("H"), t))
                .collect();
            let out = build_context(&scored(&chunks), budget);
            let included: Vec<bool> = (0..chunks.len())
                .map(|i| out.contains(&format!("[SOURCE {} –", i + 1)))
                .collect();
            // Included chunks form a prefix of the ranking.
            prop_assert!(included.windows(2).all(|w| w[0] || !w[1]));
            let text_chars: usize = chunks
                .iter()
                .zip(&included)
                .filter(|(_, inc)| **inc)
                .map(|(c, _)| char_len(c.text.trim()).min(MAX_CHUNK_TEXT))
                .sum();
            prop_assert!(text_chars <= budget);
        }

        #[test]
        fn history_fits_budget_and_is_contiguous(
            lens in proptest::collection::vec(0usize..300, 0..20),
            budget in 0usize..2_000,
        ) {
            let turns: Vec<ConversationTurn> = lens
                .iter()
                .enumerate()
                .map(|(i, n)| ConversationTurn::user(format!("{}{}", i % 10, "z".repeat(*n))))
                .collect();
            let kept = build_history(&turns, budget);
            let total: usize = kept.iter().map(|t| char_len(&t.content)).sum();
            prop_assert!(total <= budget);
            // The kept turns are exactly the newest `kept.len()` turns.
            let tail = &turns[turns.len() - kept.len()..];
            prop_assert_eq!(kept.as_slice(), tail);
        }
    }
}
