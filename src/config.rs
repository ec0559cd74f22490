//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, via [`Config::default`]) is a working configuration. See
//! [`load_config`] for the validation applied after parsing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::context::MAX_CONTEXT_CHARS;
use crate::models::{ChunkStrategy, Focus, Language, Mode, Setting};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Base URL serving the fixed book list (e.g. `http://localhost:5173/books/`).
    #[serde(default)]
    pub remote_base_url: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            remote_base_url: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./books")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default)]
    pub strategy: ChunkStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            strategy: ChunkStrategy::default(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit_rules")]
    pub limit_rules: usize,
    #[serde(default = "default_limit_story")]
    pub limit_story: usize,
    #[serde(default = "default_limit_whole_file")]
    pub limit_whole_file: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit_rules: default_limit_rules(),
            limit_story: default_limit_story(),
            limit_whole_file: default_limit_whole_file(),
        }
    }
}

fn default_limit_rules() -> usize {
    8
}
fn default_limit_story() -> usize {
    6
}
fn default_limit_whole_file() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_history_budget_rules")]
    pub history_budget_rules: usize,
    #[serde(default = "default_history_budget_story")]
    pub history_budget_story: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            history_budget_rules: default_history_budget_rules(),
            history_budget_story: default_history_budget_story(),
        }
    }
}

fn default_max_context_chars() -> usize {
    MAX_CONTEXT_CHARS
}
fn default_history_budget_rules() -> usize {
    2000
}
fn default_history_budget_story() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Inline key; prefer `api_key_env` outside of local testing.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl LlmConfig {
    /// Inline key if set, otherwise the named environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub setting: Setting,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub focus: Focus,
    #[serde(default = "default_use_llm_for_rules")]
    pub use_llm_for_rules: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            setting: Setting::default(),
            mode: Mode::default(),
            focus: Focus::default(),
            use_llm_for_rules: default_use_llm_for_rules(),
        }
    }
}

fn default_use_llm_for_rules() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }

    let r = &config.retrieval;
    if r.limit_rules < 1 || r.limit_story < 1 || r.limit_whole_file < 1 {
        anyhow::bail!("retrieval limits must be >= 1");
    }

    if config.context.max_context_chars == 0 {
        anyhow::bail!("context.max_context_chars must be > 0");
    }

    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    Ok(())
}
