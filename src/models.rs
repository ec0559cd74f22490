//! Core data models used throughout DMDesk.
//!
//! These types represent the documents, chunks, scored results, and
//! conversation turns that flow through the retrieval pipeline, plus the
//! small enums the session and CLI use to steer it.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A markdown document imported into the library.
///
/// Immutable once created. Re-importing a file produces a new `Document`
/// that supersedes the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    /// Local path or URL the document was read from.
    pub path: Option<String>,
    pub text: String,
    /// SHA-256 of `text`, used to detect unchanged re-imports.
    pub content_hash: String,
}

impl Document {
    pub fn new(file_name: impl Into<String>, path: Option<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            path,
            content_hash: format!("{:x}", hasher.finalize()),
            text,
        }
    }

    /// Identity used to match re-imports: the path when known, else the file name.
    pub fn source_key(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.file_name)
    }
}

/// The atomic retrievable unit: a bounded slice of one document.
///
/// `start_offset` and `end_offset` are byte offsets into the normalized
/// document text (see [`crate::text::normalize_document`]); `text` is the
/// markup-stripped payload of that span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub file_name: String,
    pub chunk_index: i64,
    pub heading: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
}

/// A chunk paired with its relevance score for one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f64,
}

/// Who said a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the running conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Citation exposed to the caller for every retrieved chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub file_name: String,
    pub heading: Option<String>,
    pub snippet: String,
}

/// How a document is cut into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    #[default]
    #[serde(alias = "heading")]
    ByHeading,
    #[serde(alias = "file")]
    WholeFile,
}

impl FromStr for ChunkStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "by-heading" | "heading" => Ok(Self::ByHeading),
            "whole-file" | "file" => Ok(Self::WholeFile),
            other => bail!(
                "Unknown chunk strategy: '{}'. Use by-heading or whole-file.",
                other
            ),
        }
    }
}

/// Conversation mode: strict rules lookup or open-ended storytelling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Rules,
    Story,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Rules => write!(f, "rules"),
            Mode::Story => write!(f, "story"),
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "rules" => Ok(Self::Rules),
            "story" => Ok(Self::Story),
            other => bail!("Unknown mode: '{}'. Use rules or story.", other),
        }
    }
}

/// Topic hint that biases retrieval toward a category of content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    #[default]
    General,
    Class,
    Rule,
    Monster,
    Background,
    Feat,
    Race,
    Spell,
    Item,
}

impl Focus {
    pub const ALL: [Focus; 9] = [
        Focus::General,
        Focus::Class,
        Focus::Rule,
        Focus::Monster,
        Focus::Background,
        Focus::Feat,
        Focus::Race,
        Focus::Spell,
        Focus::Item,
    ];

    /// Focus terms handed to the retriever for this topic.
    pub fn terms(self) -> &'static [&'static str] {
        match self {
            Focus::General => &[],
            Focus::Class => &["class", "subclass", "archetype"],
            Focus::Rule => &["rule", "regel", "mechanic"],
            Focus::Monster => &["monster", "creature", "statblock", "stat block"],
            Focus::Background => &["background"],
            Focus::Feat => &["feat", "talent"],
            Focus::Race => &["race", "heritage", "lineage"],
            Focus::Spell => &["spell", "ritual", "magic"],
            Focus::Item => &["item", "magic item", "gear", "equipment"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Focus::General => "general",
            Focus::Class => "class",
            Focus::Rule => "rule",
            Focus::Monster => "monster",
            Focus::Background => "background",
            Focus::Feat => "feat",
            Focus::Race => "race",
            Focus::Spell => "spell",
            Focus::Item => "item",
        }
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Focus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Focus::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown focus: '{}'", s))
    }
}

/// Preferred answer language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "nl-BE")]
    NlBe,
    #[serde(rename = "en")]
    En,
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "nl-BE" | "nl" => Ok(Self::NlBe),
            "en" => Ok(Self::En),
            other => bail!("Unknown language: '{}'. Use nl-BE or en.", other),
        }
    }
}

/// Campaign setting whose books get a small retrieval boost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Setting {
    #[default]
    Generic,
    ForgottenRealms,
    Eberron,
    Ravnica,
}

impl Setting {
    /// Lowercase tag matched against file names, `None` for generic play.
    pub fn file_tag(self) -> Option<&'static str> {
        match self {
            Setting::Generic => None,
            Setting::ForgottenRealms => Some("forgotten realms"),
            Setting::Eberron => Some("eberron"),
            Setting::Ravnica => Some("ravnica"),
        }
    }
}

impl FromStr for Setting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "generic" => Ok(Self::Generic),
            "forgotten-realms" => Ok(Self::ForgottenRealms),
            "eberron" => Ok(Self::Eberron),
            "ravnica" => Ok(Self::Ravnica),
            other => bail!("Unknown setting: '{}'", other),
        }
    }
}
