//! `dmdesk search`: rank library chunks for a query.

use anyhow::Result;
use serde::Serialize;

use crate::library::Library;
use crate::models::{Focus, ScoredChunk, Setting};
use crate::prompt::SNIPPET_CHARS;
use crate::retrieve::{retrieve, RetrieveOptions};
use crate::text::prefix_chars;

/// One ranked chunk as printed or serialized.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub score: f64,
    pub file_name: String,
    pub heading: Option<String>,
    pub chunk_index: i64,
    pub chunk_id: String,
    pub snippet: String,
}

fn to_hit(rank: usize, item: &ScoredChunk<'_>) -> SearchHit {
    SearchHit {
        rank,
        score: item.score,
        file_name: item.chunk.file_name.clone(),
        heading: item.chunk.heading.clone(),
        chunk_index: item.chunk.chunk_index,
        chunk_id: item.chunk.id.clone(),
        snippet: prefix_chars(&item.chunk.text, SNIPPET_CHARS).to_string(),
    }
}

pub fn search(library: &Library, query: &str, focus: Focus, setting: Setting, limit: usize) -> Vec<SearchHit> {
    let scored = retrieve(
        query,
        library.chunks(),
        &RetrieveOptions {
            limit,
            active_setting: setting.file_tag(),
            focus_terms: focus.terms(),
        },
    );
    scored
        .iter()
        .enumerate()
        .map(|(i, item)| to_hit(i + 1, item))
        .collect()
}

pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }

    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{}. [{:.2}] {} / {}\n",
            hit.rank,
            hit.score,
            hit.file_name,
            hit.heading.as_deref().unwrap_or("(no heading)")
        ));
        out.push_str(&format!("    excerpt: \"{}\"\n", hit.snippet.replace('\n', " ").trim()));
        out.push_str(&format!("    chunk: {}  id: {}\n\n", hit.chunk_index, hit.chunk_id));
    }
    out
}

pub fn run_search(
    library: &Library,
    query: &str,
    focus: Focus,
    setting: Setting,
    limit: usize,
    json: bool,
) -> Result<()> {
    let hits = search(library, query, focus, setting, limit);
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{}", render_hits(&hits));
    }
    Ok(())
}
