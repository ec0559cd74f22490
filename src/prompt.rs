//! Prompt composition.
//!
//! Builds the fixed system preamble, the focus hint, citations, and the
//! LLM-free rule-lookup answer, and stitches them together with the
//! budgeted context and history into the message list sent to a
//! [`ChatModel`](crate::llm::ChatModel).

use crate::context::truncate_text;
use crate::llm::ChatMessage;
use crate::models::{ConversationTurn, Focus, Language, Mode, Role, ScoredChunk, SourceRef};
use crate::text::prefix_chars;

/// Characters of chunk text shown in a citation.
pub const SNIPPET_CHARS: usize = 140;

/// Characters of chunk text quoted per source in a local answer.
pub const RULE_LOOKUP_SNIPPET: usize = 1200;

/// Number of sources quoted in a local answer.
pub const RULE_LOOKUP_SOURCES: usize = 3;

/// Persona, grounding rules, and language directive.
pub fn system_messages(language: Language, mode: Mode) -> Vec<ChatMessage> {
    let mode_label = match mode {
        Mode::Rules => "Rules / RAW questions",
        Mode::Story => "Story / improv assistance",
    };
    let base = format!(
        "You are DMDesk, a Dungeon Master assistant.\n\
You must answer strictly according to the contents of the provided D&D markdown excerpts.\n\
These excerpts come from rulebooks, setting books, and notes owned by the user.\n\
\n\
Rules:\n\
- Only use information that is explicitly present in the provided excerpts.\n\
- Do not use outside knowledge.\n\
- If the answer is not clearly supported by the excerpts, say:\n\
  \"Dit staat niet gespecificeerd in de aangeleverde boeken.\" (in Flemish Dutch)\n\
  or\n\
  \"This is not specified in the provided books.\" (in English)\n\
- Prefer concise, table-friendly and play-ready answers.\n\
- If multiple excerpts conflict, summarize the conflict clearly.\n\
- Current mode: {}.",
        mode_label
    );

    let directive = match language {
        Language::NlBe => {
            "Taal: Antwoord altijd in informeel Vlaams Nederlands, tenzij de gebruiker expliciet vraagt om Engels.\n\
Gebruik een vlotte, duidelijke toon die bruikbaar is aan de speeltafel."
        }
        Language::En => {
            "Language: Answer in clear, concise English unless the user explicitly requests another language."
        }
    };

    vec![ChatMessage::system(base), ChatMessage::system(directive)]
}

/// System message naming the retrieval focus.
pub fn focus_message(focus: Focus) -> ChatMessage {
    ChatMessage::system(format!("Question focus: {}", focus))
}

fn history_message(turn: &ConversationTurn) -> ChatMessage {
    match turn.role {
        Role::User => ChatMessage::user(turn.content.clone()),
        Role::Assistant => ChatMessage::assistant(turn.content.clone()),
    }
}

/// Everything that goes into one request.
#[derive(Debug, Clone)]
pub struct PromptParts<'a> {
    pub language: Language,
    pub mode: Mode,
    pub focus: Focus,
    /// Already budgeted, chronological.
    pub history: &'a [ConversationTurn],
    /// Output of [`build_context`](crate::context::build_context).
    pub context: &'a str,
    /// Local answer the model should refine, if any.
    pub local_draft: Option<&'a str>,
    pub query: &'a str,
}

/// Assemble the final message list.
///
/// Order: system preamble, focus hint, history, source context, optional
/// local draft, then the literal user query.
pub fn compose_messages(parts: &PromptParts<'_>) -> Vec<ChatMessage> {
    let mut messages = system_messages(parts.language, parts.mode);
    messages.push(focus_message(parts.focus));
    messages.extend(parts.history.iter().map(history_message));
    messages.push(ChatMessage::assistant(parts.context));
    if let Some(draft) = parts.local_draft {
        messages.push(ChatMessage::assistant(draft));
    }
    messages.push(ChatMessage::user(parts.query));
    messages
}

/// One citation per retrieved chunk, whether or not it fit the budget.
pub fn citations(scored: &[ScoredChunk<'_>]) -> Vec<SourceRef> {
    scored.iter().map(source_ref).collect()
}

fn source_ref(item: &ScoredChunk<'_>) -> SourceRef {
    SourceRef {
        file_name: item.chunk.file_name.clone(),
        heading: item.chunk.heading.clone(),
        snippet: prefix_chars(&item.chunk.text, SNIPPET_CHARS).to_string(),
    }
}

/// An answer assembled from the library alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAnswer {
    pub content: String,
    pub sources: Vec<SourceRef>,
}

/// Quote the top sources verbatim, without calling a model.
pub fn rule_lookup_answer(scored: &[ScoredChunk<'_>], language: Language) -> LocalAnswer {
    if scored.is_empty() {
        let content = match language {
            Language::NlBe => "Geen matchende secties gevonden in je boeken voor deze vraag.",
            Language::En => "No matching sections found in your books for this question.",
        };
        return LocalAnswer {
            content: content.to_string(),
            sources: Vec::new(),
        };
    }

    let top = &scored[..scored.len().min(RULE_LOOKUP_SOURCES)];
    let parts: Vec<String> = top
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let heading = item
                .chunk
                .heading
                .as_deref()
                .map(|h| format!(" – {}", h))
                .unwrap_or_default();
            format!(
                "Source {}: {}{}\n{}",
                idx + 1,
                item.chunk.file_name,
                heading,
                truncate_text(item.chunk.text.trim(), RULE_LOOKUP_SNIPPET)
            )
        })
        .collect();

    let intro = match language {
        Language::NlBe => "Op basis van je boeken (geen LLM gebruikt):",
        Language::En => "Based on your books (no LLM used):",
    };

    LocalAnswer {
        content: format!("{}\n\n{}", intro, parts.join("\n\n")),
        sources: top.iter().map(source_ref).collect(),
    }
}

/// Wrap a local answer as a draft for the model to refine.
pub fn local_draft(answer: &LocalAnswer) -> String {
    format!(
        "Local answer found (no LLM):\n{}\n\nUse only this together with the sources above; stay strictly with the text.",
        answer.content
    )
}
