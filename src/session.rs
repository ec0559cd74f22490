//! Conversation session.
//!
//! A [`Session`] owns the settings and the running conversation and is
//! passed explicitly to every ask; there is no global state. One ask runs
//! the whole pipeline: budgeted history → retrieval → citations → local
//! rule lookup and/or a composed model request.

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::{build_context, build_history};
use crate::library::Library;
use crate::llm::{ChatMessage, ChatModel};
use crate::models::{ChunkStrategy, ConversationTurn, Focus, Language, Mode, ScoredChunk, Setting, SourceRef};
use crate::prompt::{citations, compose_messages, local_draft, rule_lookup_answer, LocalAnswer, PromptParts};
use crate::retrieve::{retrieve, RetrieveOptions};

/// Reply added when the model call fails.
pub const FAILED_REPLY: &str = "Could not generate an answer. Possible causes: too many tokens in the context, \
a model limit, or rate limiting. Try chunking by heading or ask a shorter question.";

const RULES_TEMPERATURE: f32 = 0.2;
const STORY_TEMPERATURE: f32 = 0.6;

/// Recoverable reasons an ask cannot start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AskError {
    #[error("Import your markdown library first.")]
    EmptyLibrary,
    #[error("Add an API key first. Rules mode without a model works without a key.")]
    MissingApiKey,
}

/// Knobs that steer a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub language: Language,
    pub setting: Setting,
    pub mode: Mode,
    pub focus: Focus,
    /// Strategy the library was chunked with; whole-file chunks are fewer and larger.
    pub chunk_strategy: ChunkStrategy,
    pub use_llm_for_rules: bool,
    pub max_context_chars: usize,
    pub history_budget_rules: usize,
    pub history_budget_story: usize,
    pub limit_rules: usize,
    pub limit_story: usize,
    pub limit_whole_file: usize,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            language: config.session.language,
            setting: config.session.setting,
            mode: config.session.mode,
            focus: config.session.focus,
            chunk_strategy: config.chunking.strategy,
            use_llm_for_rules: config.session.use_llm_for_rules,
            max_context_chars: config.context.max_context_chars,
            history_budget_rules: config.context.history_budget_rules,
            history_budget_story: config.context.history_budget_story,
            limit_rules: config.retrieval.limit_rules,
            limit_story: config.retrieval.limit_story,
            limit_whole_file: config.retrieval.limit_whole_file,
        }
    }

    pub fn history_budget(&self) -> usize {
        match self.mode {
            Mode::Rules => self.history_budget_rules,
            Mode::Story => self.history_budget_story,
        }
    }

    pub fn retrieval_limit(&self) -> usize {
        match (self.chunk_strategy, self.mode) {
            (ChunkStrategy::WholeFile, _) => self.limit_whole_file,
            (_, Mode::Rules) => self.limit_rules,
            (_, Mode::Story) => self.limit_story,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self.mode {
            Mode::Rules => RULES_TEMPERATURE,
            Mode::Story => STORY_TEMPERATURE,
        }
    }

    /// Story mode always needs a model; rules mode only when refinement is on.
    pub fn needs_llm(&self) -> bool {
        self.mode == Mode::Story || self.use_llm_for_rules
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything computed for one query before any model is called.
#[derive(Debug, Clone)]
pub struct Prepared<'a> {
    pub retrieved: Vec<ScoredChunk<'a>>,
    /// One citation per retrieved chunk.
    pub sources: Vec<SourceRef>,
    /// Present in rules mode.
    pub local_answer: Option<LocalAnswer>,
    /// Present when the model should be called.
    pub messages: Option<Vec<ChatMessage>>,
    pub temperature: f32,
}

/// The assistant's answer to one ask.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub content: String,
    pub sources: Vec<SourceRef>,
    /// Recoverable problem to show the user, e.g. a failed model call.
    pub status: Option<String>,
    pub used_llm: bool,
}

/// Settings plus the conversation so far.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub settings: SessionSettings,
    turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            turns: Vec::new(),
        }
    }

    /// Conversation turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Run retrieval and build the request for `query`.
    ///
    /// History is taken from the turns recorded so far, so call this before
    /// the query itself is appended.
    pub fn prepare<'a>(&self, library: &'a Library, query: &str, llm_available: bool) -> Result<Prepared<'a>, AskError> {
        let s = &self.settings;
        if s.needs_llm() && !llm_available {
            return Err(AskError::MissingApiKey);
        }
        if library.is_empty() {
            return Err(AskError::EmptyLibrary);
        }

        let history = build_history(&self.turns, s.history_budget());
        let retrieved = retrieve(
            query,
            library.chunks(),
            &RetrieveOptions {
                limit: s.retrieval_limit(),
                active_setting: s.setting.file_tag(),
                focus_terms: s.focus.terms(),
            },
        );
        let sources = citations(&retrieved);

        let local_answer = match s.mode {
            Mode::Rules => Some(rule_lookup_answer(&retrieved, s.language)),
            Mode::Story => None,
        };

        let messages = if s.needs_llm() {
            let context = build_context(&retrieved, s.max_context_chars);
            let draft = local_answer.as_ref().map(local_draft);
            Some(compose_messages(&PromptParts {
                language: s.language,
                mode: s.mode,
                focus: s.focus,
                history: &history,
                context: &context,
                local_draft: draft.as_deref(),
                query,
            }))
        } else {
            None
        };

        Ok(Prepared {
            retrieved,
            sources,
            local_answer,
            messages,
            temperature: s.temperature(),
        })
    }

    /// Answer `query` and record both sides of the exchange.
    ///
    /// Model failures never surface as errors: they produce
    /// [`FAILED_REPLY`] with the failure in [`Reply::status`].
    pub async fn ask(
        &mut self,
        library: &Library,
        query: &str,
        model: Option<&dyn ChatModel>,
    ) -> Result<Reply, AskError> {
        let prepared = self.prepare(library, query, model.is_some())?;
        self.turns.push(ConversationTurn::user(query));

        let reply = match (prepared.messages, model) {
            (Some(messages), Some(model)) => {
                match model.complete(&messages, prepared.temperature).await {
                    Ok(completion) => {
                        info!(
                            model = model.model_name(),
                            sources = prepared.sources.len(),
                            "answered with model"
                        );
                        Reply {
                            content: completion.content,
                            sources: prepared.sources,
                            status: None,
                            used_llm: true,
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "model call failed");
                        Reply {
                            content: FAILED_REPLY.to_string(),
                            sources: Vec::new(),
                            status: Some(e.to_string()),
                            used_llm: true,
                        }
                    }
                }
            }
            _ => {
                let local = prepared.local_answer.unwrap_or_else(|| rule_lookup_answer(&[], self.settings.language));
                Reply {
                    content: local.content,
                    sources: local.sources,
                    status: None,
                    used_llm: false,
                }
            }
        };

        self.turns.push(ConversationTurn::assistant(reply.content.clone()));
        Ok(reply)
    }
}
