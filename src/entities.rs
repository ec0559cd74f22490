//! Structured entity extraction from rulebook markdown.
//!
//! A separate, regex-driven parser that sits next to retrieval rather than
//! inside it: it reads `##` sections of a [`Document`] and turns the ones
//! that look like statblocks into [`BookMonster`] records. It also collects
//! class and race names from player-facing books.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::models::Document;
use crate::text::{normalize_document, prefix_chars, strip_markup};

/// Longest statblock text kept per monster, in characters.
pub const MAX_MONSTER_TEXT: usize = 4000;

static SECTION_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^##\s+(.+)").unwrap());
static STAT_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Armor Class|Hit Points|Speed|Saving Throws|Actions").unwrap());
static ARMOR_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Armor Class\s+(\d+)").unwrap());
static HIT_POINTS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Hit Points\s+(\d+)").unwrap());
static MD_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").unwrap());
static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]*src=["']([^"']+)["'][^>]*>"#).unwrap());
static PLAYER_BOOK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)player's handbook|phb|class|race|heritage").unwrap());
static NAME_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+([A-Z][A-Za-z'’ -]{2,40})$").unwrap());
static MONSTER_BOOK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)monster manual").unwrap());

/// A creature statblock found in a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookMonster {
    pub id: String,
    pub file_name: String,
    pub name: String,
    /// Markup-stripped statblock text, capped at [`MAX_MONSTER_TEXT`].
    pub source_text: String,
    pub armor_class: Option<u32>,
    pub hit_points: Option<u32>,
    pub image_url: Option<String>,
}

/// Whether a file name looks like a monster manual.
pub fn is_monster_book(file_name: &str) -> bool {
    MONSTER_BOOK_RE.is_match(file_name)
}

/// Split normalized text into `##` sections; text before the first one is dropped.
fn level_two_sections(text: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current: Option<String> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if let Some(caps) = SECTION_HEADING_RE.captures(line) {
            if let Some(name) = current.take() {
                sections.push((name, buffer.join("\n").trim().to_string()));
            }
            buffer.clear();
            current = Some(caps[1].trim().to_string());
            continue;
        }
        if current.is_some() {
            buffer.push(line);
        }
    }
    if let Some(name) = current {
        sections.push((name, buffer.join("\n").trim().to_string()));
    }

    sections
}

/// Extract statblocks from every `##` section carrying stat markers.
pub fn extract_book_monsters(doc: &Document) -> Vec<BookMonster> {
    let normalized = normalize_document(&doc.text);

    level_two_sections(&normalized)
        .into_iter()
        .filter(|(_, text)| STAT_MARKER_RE.is_match(text))
        .map(|(name, text)| {
            let number = |re: &Regex| {
                re.captures(&text)
                    .and_then(|c| c[1].parse::<u32>().ok())
            };
            let image_url = MD_IMAGE_RE
                .captures(&text)
                .or_else(|| IMG_TAG_RE.captures(&text))
                .map(|c| c[1].to_string());
            let stripped = strip_markup(&text);

            BookMonster {
                id: Uuid::new_v4().to_string(),
                file_name: doc.file_name.clone(),
                armor_class: number(&ARMOR_CLASS_RE),
                hit_points: number(&HIT_POINTS_RE),
                image_url,
                source_text: prefix_chars(&stripped, MAX_MONSTER_TEXT).to_string(),
                name,
            }
        })
        .collect()
}

/// Collect class and race names from player-facing books.
///
/// Only files whose name mentions the player's handbook, classes, races, or
/// heritages are read. Names are `##` headings starting with a capital,
/// 3–40 characters long, excluding chapter titles. Sorted and deduplicated.
pub fn extract_class_race_names(docs: &[Document]) -> Vec<String> {
    let mut names = BTreeSet::new();

    for doc in docs.iter().filter(|d| PLAYER_BOOK_RE.is_match(&d.file_name)) {
        let normalized = normalize_document(&doc.text);
        for line in normalized.split('\n') {
            let Some(caps) = NAME_HEADING_RE.captures(line) else {
                continue;
            };
            let name = caps[1].trim();
            if name.to_lowercase().contains("chapter") {
                continue;
            }
            if name.chars().count() > 2 && name.chars().count() < 40 {
                names.insert(name.to_string());
            }
        }
    }

    names.into_iter().collect()
}
