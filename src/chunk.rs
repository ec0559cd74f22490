//! Heading-aware markdown chunker.
//!
//! Splits one [`Document`] into [`Chunk`]s that respect a configurable
//! `max_chunk_size` (in bytes of normalized text). Each chunk is tagged with
//! the nearest heading above it so retrieval can reward heading matches and
//! citations can name the section.
//!
//! # Algorithm
//!
//! 1. Normalize the document (line endings, `<hN>` tags → `#` headings).
//! 2. With [`ChunkStrategy::WholeFile`], return the whole text as one chunk.
//! 3. Otherwise find every `#`–`######` heading line. Each heading opens a
//!    section that runs to the next heading. Text before the first heading
//!    is an `"Intro"` section.
//! 4. Walk each section with a window of `max_chunk_size`. Cut at the last
//!    paragraph break in the window if it lies past the window's midpoint,
//!    else at the last sentence break past the midpoint, else hard-cut at the
//!    window end.
//! 5. Strip markup from each slice; empty slices produce no chunk.
//!
//! # Example
//!
//! ```rust
//! use dmdesk::chunk::chunk_document;
//! use dmdesk::models::{ChunkStrategy, Document};
//!
//! let doc = Document::new("rules.md", None, "## Stealth\nHide in shadows.");
//! let chunks = chunk_document(&doc, 2600, ChunkStrategy::ByHeading);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].heading.as_deref(), Some("Stealth"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Chunk, ChunkStrategy, Document};
use crate::text::{floor_char_boundary, next_char_boundary, normalize_document, strip_markup};

/// Default maximum chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 2600;

/// Heading assigned to text that precedes the first heading.
pub const INTRO_HEADING: &str = "Intro";

/// Heading assigned to the single chunk of the whole-file strategy.
pub const FULL_FILE_HEADING: &str = "Full file";

static HEADING_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+.*$").unwrap());

/// A heading-bounded span of the normalized document.
struct Section {
    heading: String,
    start: usize,
    end: usize,
}

/// Split a document into chunks.
///
/// Never fails: documents without headings become one `"Intro"` section,
/// and sections that strip down to nothing yield no chunks. Chunk indices
/// are contiguous from 0 and chunk ids are derived from the document id and
/// index, so re-chunking the same document is deterministic.
pub fn chunk_document(doc: &Document, max_chunk_size: usize, strategy: ChunkStrategy) -> Vec<Chunk> {
    let content = normalize_document(&doc.text);

    let chunks = match strategy {
        ChunkStrategy::WholeFile => vec![make_chunk(
            doc,
            0,
            FULL_FILE_HEADING,
            0,
            content.len(),
            content.clone(),
        )],
        ChunkStrategy::ByHeading => {
            let max = max_chunk_size.max(1);
            let mut chunks = Vec::new();
            for section in find_sections(&content) {
                slice_section(doc, &content, &section, max, &mut chunks);
            }
            chunks
        }
    };

    debug!(
        file = %doc.file_name,
        chunks = chunks.len(),
        ?strategy,
        "chunked document"
    );
    chunks
}

/// Locate heading-bounded sections in normalized text.
fn find_sections(content: &str) -> Vec<Section> {
    let headings: Vec<_> = HEADING_LINE_RE.find_iter(content).collect();

    if headings.is_empty() {
        return vec![Section {
            heading: INTRO_HEADING.to_string(),
            start: 0,
            end: content.len(),
        }];
    }

    let mut sections = Vec::with_capacity(headings.len() + 1);
    let first = headings[0].start();
    if first > 0 {
        sections.push(Section {
            heading: INTRO_HEADING.to_string(),
            start: 0,
            end: first,
        });
    }

    for (idx, m) in headings.iter().enumerate() {
        let end = headings
            .get(idx + 1)
            .map(|next| next.start())
            .unwrap_or(content.len());
        let heading = m
            .as_str()
            .trim_start_matches('#')
            .trim()
            .to_string();
        sections.push(Section {
            heading,
            start: m.start(),
            end,
        });
    }

    sections
}

/// Walk one section with a sliding window, pushing the resulting chunks.
fn slice_section(doc: &Document, content: &str, section: &Section, max: usize, out: &mut Vec<Chunk>) {
    let text = &content[section.start..section.end];
    let length = text.len();
    let half = max / 2;
    let mut local_start = 0;

    while local_start < length {
        let remaining = length - local_start;
        let mut target_end = floor_char_boundary(text, local_start + remaining.min(max));
        if target_end == local_start {
            // Window narrower than one character; take the character anyway.
            target_end = next_char_boundary(text, local_start);
        }
        let window = &text[local_start..target_end];

        let cut = match window.rfind("\n\n") {
            Some(pos) if pos > half => local_start + pos + 2,
            _ => match window.rfind(". ") {
                Some(pos) if pos > half => local_start + pos + 2,
                _ => target_end,
            },
        };

        let payload = strip_markup(&text[local_start..cut]);
        if !payload.is_empty() {
            let index = out.len() as i64;
            out.push(make_chunk(
                doc,
                index,
                &section.heading,
                section.start + local_start,
                section.start + cut,
                payload,
            ));
        }

        local_start = cut;
    }
}

fn make_chunk(
    doc: &Document,
    index: i64,
    heading: &str,
    start_offset: usize,
    end_offset: usize,
    text: String,
) -> Chunk {
    let name = format!("{}:{}", doc.id, index);
    Chunk {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
        document_id: doc.id.clone(),
        file_name: doc.file_name.clone(),
        chunk_index: index,
        heading: Some(heading.to_string()),
        start_offset,
        end_offset,
        text,
    }
}
