//! The document library.
//!
//! Loads markdown [`Document`]s from a local directory or from a fixed list
//! of books served over HTTP, and holds the pooled [`Chunk`]s of everything
//! currently imported. Re-importing a file name supersedes the old document
//! wholesale.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::chunk_document;
use crate::config::{Config, LibraryConfig};
use crate::entities::{extract_book_monsters, extract_class_race_names, is_monster_book, BookMonster};
use crate::models::{Chunk, ChunkStrategy, Document};

/// Books fetched by [`fetch_books`] when loading the shared library.
pub const DEFAULT_BOOK_FILES: [&str; 24] = [
    "Acquisitions Incorporated.md",
    "Astral Adventurer's Guide.md",
    "Bigby Presents_ Glory of the Giants.md",
    "Boo's Astral Menagerie.md",
    "Dungeon Master's Guide (2024).md",
    "Dungeon Master's Screen (2024).md",
    "Fizban's Treasury of Dragons.md",
    "Forgotten Realms_ Adventures in Faer–n.md",
    "Forgotten Realms_ Heroes of Faer–n.md",
    "Heroes' Feast Flavors of the Multiverse.md",
    "Monster Manual (2025).md",
    "Monstrous Compendium Volume 4_ Eldraine Creatures.md",
    "Mordenkainen Presents_ Monsters of the Multiverse.md",
    "Mordenkainen's Tome of Foes.md",
    "Morte's Planar Parade.md",
    "Player's Handbook (2024).md",
    "Puncheons and Flagons.md",
    "Sigil and the Outlands.md",
    "Tarot Deck.md",
    "Tasha's Cauldron of Everything.md",
    "The Book of Many Things.md",
    "The Deck of Many Things_ Card Reference Guide.md",
    "Volo's Guide to Monsters.md",
    "Xanathar's Guide to Everything.md",
];

/// Read every matching file under `config.root`.
///
/// Files are returned sorted by relative path. Files that are not valid
/// UTF-8 are skipped with a warning.
pub fn read_directory(config: &LibraryConfig) -> Result<Vec<Document>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Library root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut found = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        found.push((rel_str, path.to_path_buf()));
    }

    // Sort for deterministic ordering
    found.sort_by(|a, b| a.0.cmp(&b.0));

    let mut docs = Vec::with_capacity(found.len());
    for (rel, path) in found {
        match std::fs::read_to_string(&path) {
            Ok(text) => docs.push(document_from_path(&path, text)),
            Err(e) => warn!(file = %rel, error = %e, "skipping unreadable file"),
        }
    }

    info!(root = %root.display(), documents = docs.len(), "read library directory");
    Ok(docs)
}

/// Read the given files as documents.
pub fn read_files(paths: &[impl AsRef<Path>]) -> Result<Vec<Document>> {
    paths
        .iter()
        .map(|p| {
            let path = p.as_ref();
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            Ok(document_from_path(path, text))
        })
        .collect()
}

fn document_from_path(path: &Path, text: String) -> Document {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Document::new(file_name, Some(path.display().to_string()), text)
}

/// Fetch `names` from `base_url`.
///
/// Any non-success status aborts the whole load.
pub async fn fetch_books(base_url: &str, names: &[&str], timeout: Duration) -> Result<Vec<Document>> {
    let base = if base_url.ends_with('/') {
        reqwest::Url::parse(base_url)
    } else {
        reqwest::Url::parse(&format!("{}/", base_url))
    }
    .with_context(|| format!("Invalid library base URL: {}", base_url))?;

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let mut docs = Vec::with_capacity(names.len());

    for name in names {
        let url = base
            .join(name)
            .with_context(|| format!("Invalid book name: {}", name))?;
        let response = client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to load book: {}", name))?;

        let status = response.status();
        if !status.is_success() {
            bail!("failed to load book: {} ({})", name, status);
        }

        let text = response.text().await?;
        debug!(book = %name, bytes = text.len(), "fetched book");
        docs.push(Document::new(*name, Some(url.to_string()), text));
    }

    info!(base = %base, documents = docs.len(), "fetched library");
    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Counts reported by [`Library::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub added: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub chunks_written: usize,
}

/// Imported documents and their pooled chunks.
#[derive(Debug, Clone, Default)]
pub struct Library {
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    /// Strategy and size each document was chunked with, by document id.
    chunked_with: HashMap<String, (ChunkStrategy, usize)>,
    last_import_at: Option<DateTime<Utc>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import documents, chunking each with `strategy`.
    ///
    /// A document whose [`Document::source_key`] is already present
    /// replaces the old one and its chunks. The old document is kept as is
    /// only when its content hash and chunking parameters both match.
    pub fn import(&mut self, docs: Vec<Document>, strategy: ChunkStrategy, max_chunk_size: usize) -> ImportStats {
        let mut stats = ImportStats::default();
        let params = (strategy, max_chunk_size);

        for doc in docs {
            match self.documents.iter().position(|d| d.source_key() == doc.source_key()) {
                Some(pos)
                    if self.documents[pos].content_hash == doc.content_hash
                        && self.chunked_with.get(&self.documents[pos].id) == Some(&params) =>
                {
                    stats.unchanged += 1;
                    continue;
                }
                Some(pos) => {
                    let old = self.documents.remove(pos);
                    self.chunks.retain(|c| c.document_id != old.id);
                    self.chunked_with.remove(&old.id);
                    stats.replaced += 1;
                }
                None => stats.added += 1,
            }

            let chunks = chunk_document(&doc, max_chunk_size, strategy);
            stats.chunks_written += chunks.len();
            self.chunks.extend(chunks);
            self.chunked_with.insert(doc.id.clone(), params);
            self.documents.push(doc);
        }

        self.last_import_at = Some(Utc::now());
        info!(
            added = stats.added,
            replaced = stats.replaced,
            unchanged = stats.unchanged,
            chunks = stats.chunks_written,
            "imported documents"
        );
        stats
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// All chunks, pooled across documents in import order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn last_import_at(&self) -> Option<DateTime<Utc>> {
        self.last_import_at
    }

    /// Number of chunks belonging to one document.
    pub fn chunk_count(&self, document_id: &str) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .count()
    }

    /// Statblocks parsed from monster-manual documents.
    pub fn monsters(&self) -> Vec<BookMonster> {
        self.documents
            .iter()
            .filter(|d| is_monster_book(&d.file_name))
            .flat_map(extract_book_monsters)
            .collect()
    }

    pub fn class_race_names(&self) -> Vec<String> {
        extract_class_race_names(&self.documents)
    }

    /// Build a library from config: the local root, or the fixed book list
    /// from `library.remote_base_url` when `remote` is set.
    pub async fn load(config: &Config, remote: bool) -> Result<Self> {
        let docs = if remote {
            let base = config
                .library
                .remote_base_url
                .as_deref()
                .context("library.remote_base_url is not set")?;
            let timeout = Duration::from_secs(config.library.fetch_timeout_secs);
            fetch_books(base, &DEFAULT_BOOK_FILES, timeout).await?
        } else {
            read_directory(&config.library)?
        };

        let mut library = Self::new();
        library.import(docs, config.chunking.strategy, config.chunking.max_chunk_size);
        Ok(library)
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.chunks.clear();
        self.chunked_with.clear();
        self.last_import_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.md"), "## Stealth\nHide.").unwrap();
        fs::write(tmp.path().join("a.md"), "## Darkvision\nSee.").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        fs::write(tmp.path().join("node_modules/x.md"), "ignored").unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.md"), "Intro only.").unwrap();
        tmp
    }

    fn config_for(root: &Path) -> LibraryConfig {
        LibraryConfig {
            root: root.to_path_buf(),
            ..LibraryConfig::default()
        }
    }

    #[test]
    fn test_read_directory_filters_and_sorts() {
        let tmp = setup_dir();
        let docs = read_directory(&config_for(tmp.path())).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.md", "c.md"]);
    }

    #[test]
    fn test_read_directory_excludes() {
        let tmp = setup_dir();
        let config = LibraryConfig {
            exclude_globs: vec!["sub/**".to_string()],
            ..config_for(tmp.path())
        };
        let docs = read_directory(&config).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_missing_root_errors() {
        let config = config_for(Path::new("/no/such/library"));
        assert!(read_directory(&config).is_err());
    }

    #[test]
    fn test_read_files_reports_missing() {
        let tmp = setup_dir();
        assert_eq!(read_files(&[tmp.path().join("a.md")]).unwrap().len(), 1);
        assert!(read_files(&[tmp.path().join("missing.md")]).is_err());
    }

    #[test]
    fn test_import_pools_chunks() {
        let mut lib = Library::new();
        let stats = lib.import(
            vec![
                Document::new("a.md", None, "## One\nx\n## Two\ny"),
                Document::new("b.md", None, "## Three\nz"),
            ],
            ChunkStrategy::ByHeading,
            2600,
        );
        assert_eq!(stats.added, 2);
        assert_eq!(stats.chunks_written, 3);
        assert_eq!(lib.chunks().len(), 3);
        assert!(lib.last_import_at().is_some());
        let a_id = lib.documents()[0].id.clone();
        assert_eq!(lib.chunk_count(&a_id), 2);
    }

    #[test]
    fn test_reimport_supersedes() {
        let mut lib = Library::new();
        lib.import(vec![Document::new("a.md", None, "## Old\nx")], ChunkStrategy::ByHeading, 2600);

        let same = lib.import(vec![Document::new("a.md", None, "## Old\nx")], ChunkStrategy::ByHeading, 2600);
        assert_eq!(same.unchanged, 1);
        assert_eq!(lib.documents().len(), 1);

        let changed = lib.import(vec![Document::new("a.md", None, "## New\ny")], ChunkStrategy::ByHeading, 2600);
        assert_eq!(changed.replaced, 1);
        assert_eq!(lib.documents().len(), 1);
        assert_eq!(lib.chunks().len(), 1);
        assert_eq!(lib.chunks()[0].heading.as_deref(), Some("New"));
    }

    #[test]
    fn test_same_basename_in_subdirectories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("phb")).unwrap();
        fs::create_dir_all(tmp.path().join("dmg")).unwrap();
        fs::write(tmp.path().join("phb/intro.md"), "## Players
Roll dice.").unwrap();
        fs::write(tmp.path().join("dmg/intro.md"), "## Masters
Run games.").unwrap();

        let docs = read_directory(&config_for(tmp.path())).unwrap();
        let mut lib = Library::new();
        let stats = lib.import(docs, ChunkStrategy::ByHeading, 2600);

        assert_eq!(stats.added, 2);
        assert_eq!(stats.replaced, 0);
        assert_eq!(lib.documents().len(), 2);
        assert_eq!(lib.chunks().len(), 2);
        assert!(lib.documents().iter().all(|d| d.file_name == "intro.md"));
    }

    #[test]
    fn test_reimport_with_new_strategy_rechunks() {
        let mut lib = Library::new();
        let text = "## A\nx\n\n## B\ny";
        lib.import(vec![Document::new("a.md", None, text)], ChunkStrategy::ByHeading, 2600);
        assert_eq!(lib.chunks().len(), 2);

        let stats = lib.import(vec![Document::new("a.md", None, text)], ChunkStrategy::WholeFile, 2600);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.unchanged, 0);
        assert_eq!(lib.chunks().len(), 1);
        assert_eq!(lib.chunks()[0].heading.as_deref(), Some("Full file"));

        let resized = lib.import(vec![Document::new("a.md", None, text)], ChunkStrategy::WholeFile, 100);
        assert_eq!(resized.replaced, 1);

        let again = lib.import(vec![Document::new("a.md", None, text)], ChunkStrategy::WholeFile, 100);
        assert_eq!(again.unchanged, 1);
        assert_eq!(lib.chunks().len(), 1);
    }

    #[test]
    fn test_class_race_names_from_player_books() {
        let mut lib = Library::new();
        lib.import(
            vec![
                Document::new("Player's Handbook (2024).md", None, "## Chapter 2 Races\n## Wizard\n## Dwarf"),
                Document::new("Monster Manual (2025).md", None, "## Goblin\nArmor Class 15"),
            ],
            ChunkStrategy::ByHeading,
            2600,
        );
        assert_eq!(lib.class_race_names(), vec!["Dwarf", "Wizard"]);
    }

    #[test]
    fn test_monsters_only_from_monster_manual() {
        let mut lib = Library::new();
        lib.import(
            vec![
                Document::new("Monster Manual (2025).md", None, "## Goblin\nArmor Class 15"),
                Document::new("Volo's Guide to Monsters.md", None, "## Kobold\nArmor Class 12"),
            ],
            ChunkStrategy::ByHeading,
            2600,
        );
        let monsters = lib.monsters();
        assert_eq!(monsters.len(), 1);
        assert_eq!(monsters[0].name, "Goblin");
    }

    #[test]
    fn test_clear() {
        let mut lib = Library::new();
        lib.import(vec![Document::new("a.md", None, "text")], ChunkStrategy::WholeFile, 2600);
        assert!(!lib.is_empty());
        lib.clear();
        assert!(lib.is_empty());
        assert!(lib.documents().is_empty());
        assert!(lib.last_import_at().is_none());
    }

    #[tokio::test]
    async fn test_fetch_books_rejects_bad_base_url() {
        let result = fetch_books("not a url", &["a.md"], Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_local_root() {
        let tmp = setup_dir();
        let mut config = Config::default();
        config.library.root = tmp.path().to_path_buf();
        let lib = Library::load(&config, false).await.unwrap();
        assert_eq!(lib.documents().len(), 3);
        assert_eq!(lib.chunks().len(), 3);
    }

    #[tokio::test]
    async fn test_load_remote_needs_base_url() {
        let err = Library::load(&Config::default(), true).await.unwrap_err();
        assert!(err.to_string().contains("remote_base_url"));
    }
}
