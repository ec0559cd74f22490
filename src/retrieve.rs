//! Lexical retriever.
//!
//! Scores every chunk of the pool against a query by counting literal
//! token occurrences and adding fixed bonuses for heading, file-name, focus
//! term, and active-setting matches. There is no index: each call is a pure
//! pass over the chunks it is handed.
//!
//! # Scoring
//!
//! | Signal | Weight |
//! |--------|--------|
//! | query token occurrence in text | 1.0 each |
//! | query or focus token in heading | 2.0 |
//! | focus term in text | 1.5 |
//! | active setting tag in file name | 1.5 |
//! | query or focus token in file name | 1.0 |
//!
//! Results are sorted by score descending with a stable sort, so ties keep
//! the pool order and repeated calls return identical output.

use tracing::debug;

use crate::models::{Chunk, ScoredChunk};

/// Default number of chunks returned.
pub const DEFAULT_LIMIT: usize = 8;

/// Tokens used when a query has no usable words.
pub const FALLBACK_TOKENS: [&str; 4] = ["regel", "rule", "lore", "story"];

const OCCURRENCE_WEIGHT: f64 = 1.0;
const HEADING_BONUS: f64 = 2.0;
const FILE_NAME_BONUS: f64 = 1.0;
const FOCUS_TEXT_BONUS: f64 = 1.5;
const SETTING_BONUS: f64 = 1.5;

/// Retrieval tuning for a single call.
#[derive(Debug, Clone)]
pub struct RetrieveOptions<'a> {
    /// Maximum results to return.
    pub limit: usize,
    /// Lowercase tag; chunks whose file name contains it get a bonus.
    pub active_setting: Option<&'a str>,
    /// Domain hints such as `"monster"` or `"spell"`.
    pub focus_terms: &'a [&'a str],
}

impl Default for RetrieveOptions<'_> {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            active_setting: None,
            focus_terms: &[],
        }
    }
}

/// Split a query into lowercase search tokens.
///
/// Splits on anything that is not an ASCII letter, digit, or Latin-1 /
/// Latin Extended-A letter, and drops single-character tokens. Falls back
/// to [`FALLBACK_TOKENS`] when nothing survives.
pub fn tokenize(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let tokens: Vec<String> = lowered
        .split(|c: char| !is_word_char(c))
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        FALLBACK_TOKENS.iter().map(|t| t.to_string()).collect()
    } else {
        tokens
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('\u{00C0}'..='\u{017F}').contains(&c)
}

/// Score one chunk for already-tokenized input.
pub fn score_chunk(
    chunk: &Chunk,
    tokens: &[String],
    focus_terms: &[String],
    active_setting: Option<&str>,
) -> f64 {
    let text = chunk.text.to_lowercase();
    let heading = chunk
        .heading
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let file_name = chunk.file_name.to_lowercase();

    let mut score = 0.0;
    for term in tokens.iter().filter(|t| !t.is_empty()) {
        score += text.matches(term.as_str()).count() as f64 * OCCURRENCE_WEIGHT;
        if heading.contains(term.as_str()) {
            score += HEADING_BONUS;
        }
        if file_name.contains(term.as_str()) {
            score += FILE_NAME_BONUS;
        }
    }

    for term in focus_terms.iter().filter(|t| !t.is_empty()) {
        if text.contains(term.as_str()) {
            score += FOCUS_TEXT_BONUS;
        }
        if heading.contains(term.as_str()) {
            score += HEADING_BONUS;
        }
        if file_name.contains(term.as_str()) {
            score += FILE_NAME_BONUS;
        }
    }

    if let Some(tag) = active_setting.filter(|t| !t.is_empty()) {
        if file_name.contains(&tag.to_lowercase()) {
            score += SETTING_BONUS;
        }
    }

    score
}

/// Rank `chunks` against `query` and return the top `options.limit`.
///
/// Zero-score chunks are not filtered out; callers that need a relevance
/// floor must apply it themselves. An empty pool yields an empty result.
pub fn retrieve<'a>(query: &str, chunks: &'a [Chunk], options: &RetrieveOptions<'_>) -> Vec<ScoredChunk<'a>> {
    let tokens = tokenize(query);
    let focus: Vec<String> = options
        .focus_terms
        .iter()
        .map(|t| t.to_lowercase())
        .collect();

    let mut scored: Vec<ScoredChunk<'a>> = chunks
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: score_chunk(chunk, &tokens, &focus, options.active_setting),
        })
        .collect();

    // Stable: equal scores keep pool order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(options.limit);

    debug!(
        tokens = ?tokens,
        pool = chunks.len(),
        returned = scored.len(),
        "retrieved chunks"
    );
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_chunk(idx: i64, file: &str, heading: Option<&str>, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", idx),
            document_id: "d1".to_string(),
            file_name: file.to_string(),
            chunk_index: idx,
            heading: heading.map(str::to_string),
            start_offset: 0,
            end_offset: text.len(),
            text: text.to_string(),
        }
    }

    fn scenario() -> Vec<Chunk> {
        vec![
            make_chunk(0, "phb.md", Some("Stealth"), "## Stealth You try to hide from enemies."),
            make_chunk(1, "phb.md", Some("Darkvision"), "## Darkvision You see in dim light."),
        ]
    }

    #[test]
    fn test_tokenize_splits_and_lowercases() {
        assert_eq!(tokenize("What about Stealth, in LIGHT?"), vec!["what", "about", "stealth", "in", "light"]);
    }

    #[test]
    fn test_tokenize_keeps_latin_letters() {
        assert_eq!(tokenize("Faerûn's élan"), vec!["faerûn", "élan"]);
    }

    #[test]
    fn test_tokenize_drops_single_chars() {
        assert_eq!(tokenize("a b cd"), vec!["cd"]);
    }

    #[test]
    fn test_tokenize_fallback() {
        assert_eq!(tokenize("?! a"), FALLBACK_TOKENS.to_vec());
        assert_eq!(tokenize(""), FALLBACK_TOKENS.to_vec());
    }

    #[test]
    fn test_stealth_query_ranks_stealth_first() {
        let chunks = scenario();
        let results = retrieve("stealth", &chunks, &RetrieveOptions::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.heading.as_deref(), Some("Stealth"));
        assert!(results[0].score > 0.0);
        assert_eq!(results[1].chunk.heading.as_deref(), Some("Darkvision"));
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn test_empty_pool() {
        assert!(retrieve("stealth", &[], &RetrieveOptions::default()).is_empty());
    }

    #[test]
    fn test_limit_truncates() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| make_chunk(i, "a.md", None, "goblin"))
            .collect();
        let opts = RetrieveOptions {
            limit: 5,
            ..Default::default()
        };
        assert_eq!(retrieve("goblin", &chunks, &opts).len(), 5);
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let chunks: Vec<Chunk> = (0..6)
            .map(|i| make_chunk(i, "a.md", None, "same text"))
            .collect();
        let results = retrieve("same", &chunks, &RetrieveOptions::default());
        let order: Vec<i64> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_heading_beats_focus_beats_occurrence() {
        let heading = make_chunk(0, "x.md", Some("Goblin"), "nothing here");
        let tokens = vec!["goblin".to_string()];
        let heading_score = score_chunk(&heading, &tokens, &[], None);

        let focus = make_chunk(1, "x.md", None, "a monster appears");
        let focus_score = score_chunk(&focus, &[], &["monster".to_string()], None);

        let plain = make_chunk(2, "x.md", None, "goblin");
        let plain_score = score_chunk(&plain, &tokens, &[], None);

        assert!(heading_score > focus_score);
        assert!(focus_score > plain_score);
        assert!(plain_score > 0.0);
    }

    #[test]
    fn test_file_name_and_setting_bonus() {
        let chunk = make_chunk(0, "Forgotten Realms_ Heroes.md", None, "dwarves");
        let tokens = vec!["dwarves".to_string()];
        let base = score_chunk(&chunk, &tokens, &[], None);
        let boosted = score_chunk(&chunk, &tokens, &[], Some("forgotten realms"));
        assert_eq!(boosted - base, 1.5);

        let by_name = score_chunk(&chunk, &["heroes".to_string()], &[], None);
        assert_eq!(by_name, 1.0);
    }

    #[test]
    fn test_focus_terms_shift_ranking() {
        let chunks = vec![
            make_chunk(0, "a.md", Some("Fire"), "fire burns"),
            make_chunk(1, "a.md", Some("Fireball"), "a spell of fire"),
        ];
        let plain = retrieve("fire", &chunks, &RetrieveOptions::default());
        assert_eq!(plain[0].chunk.chunk_index, 0);

        let focused = retrieve(
            "fire",
            &chunks,
            &RetrieveOptions {
                focus_terms: &["spell"],
                ..Default::default()
            },
        );
        assert_eq!(focused[0].chunk.chunk_index, 1);
    }

    #[test]
    fn test_counts_every_occurrence() {
        let chunk = make_chunk(0, "x.md", None, "Hide. hide, HIDE");
        assert_eq!(score_chunk(&chunk, &["hide".to_string()], &[], None), 3.0);
    }

    proptest! {
        #[test]
        fn extra_occurrence_never_lowers_score(
            texts in proptest::collection::vec("[a-z ]{0,60}", 1..6),
            target in 0usize..6,
            query in "[a-z]{2,6}( [a-z]{2,6}){0,2}",
        ) {
            let target = target % texts.len();
            let chunks: Vec<Chunk> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| make_chunk(i as i64, "f.md", None, t))
                .collect();
            let token = tokenize(&query)[0].clone();
            let mut bumped = chunks.clone();
            bumped[target].text = format!("{} {}", bumped[target].text, token);

            let tokens = tokenize(&query);
            for (i, (before, after)) in chunks.iter().zip(bumped.iter()).enumerate() {
                let b = score_chunk(before, &tokens, &[], None);
                let a = score_chunk(after, &tokens, &[], None);
                if i == target {
                    prop_assert!(a >= b);
                } else {
                    prop_assert_eq!(a, b);
                }
            }
        }

        #[test]
        fn retrieve_is_deterministic(
            texts in proptest::collection::vec("[a-c ]{0,30}", 0..12),
            query in "[a-c ]{0,8}",
        ) {
            let chunks: Vec<Chunk> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| make_chunk(i as i64, "f.md", None, t))
                .collect();
            let first = retrieve(&query, &chunks, &RetrieveOptions::default());
            let second = retrieve(&query, &chunks, &RetrieveOptions::default());
            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(a.chunk.id.as_str(), b.chunk.id.as_str());
                prop_assert_eq!(a.score.to_bits(), b.score.to_bits());
            }
            for pair in first.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    prop_assert!(pair[0].chunk.chunk_index < pair[1].chunk.chunk_index);
                }
            }
        }
    }
}
