//! `dmdesk sources`: what is in the library.

use crate::library::Library;

/// Render the document table with per-document chunk counts.
pub fn render_sources(library: &Library) -> String {
    let mut out = String::new();
    if library.documents().is_empty() {
        out.push_str("No documents imported.\n");
        return out;
    }

    out.push_str(&format!("{:<56} {:>8} {:>10}\n", "FILE", "CHUNKS", "CHARS"));
    out.push_str(&format!("{}\n", "-".repeat(76)));
    for doc in library.documents() {
        out.push_str(&format!(
            "{:<56} {:>8} {:>10}\n",
            doc.file_name,
            library.chunk_count(&doc.id),
            doc.text.chars().count()
        ));
    }
    out.push('\n');
    out.push_str(&format!(
        "  Documents:   {}\n  Chunks:      {}\n",
        library.documents().len(),
        library.chunks().len()
    ));
    if let Some(at) = library.last_import_at() {
        out.push_str(&format!("  Imported:    {}\n", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    out
}

pub fn run_sources(library: &Library) {
    print!("{}", render_sources(library));
}
