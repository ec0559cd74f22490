//! # DMDesk
//!
//! A Dungeon Master's desk assistant that answers from your own markdown
//! rulebooks.
//!
//! DMDesk splits books into heading-tagged chunks, ranks them lexically
//! against a question, and assembles a character-budgeted prompt for a
//! chat model. In rules mode it can also answer without any model by
//! quoting the best-matching sections.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │   Library   │──▶│   Chunker   │──▶│  Retriever  │──▶│ Context  │
//! │ local / URL │   │ by heading  │   │  lexical    │   │ budgeter │
//! └─────────────┘   └─────────────┘   └─────────────┘   └────┬─────┘
//!                                                           │
//!                         ┌──────────────┐   ┌──────────┐   │
//!                         │   Session    │◀──│  Prompt  │◀──┘
//!                         │ turns + ask  │──▶│ ChatModel│
//!                         └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dmdesk --library ./books sources
//! dmdesk --library ./books search "stealth" --focus rule
//! dmdesk --library ./books ask "How does stealth work?" --no-llm
//! dmdesk --library ./books chat --mode story
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`text`] | Markup normalization and char-safe slicing |
//! | [`chunk`] | Document chunking |
//! | [`retrieve`] | Lexical scoring and ranking |
//! | [`context`] | Budgeted source context and history |
//! | [`prompt`] | System prompt, message composition, citations |
//! | [`llm`] | Chat model abstraction and OpenAI client |
//! | [`library`] | Document loading and the chunk pool |
//! | [`entities`] | Statblock and class/race extraction |
//! | [`session`] | Conversation state and the ask pipeline |
//! | [`sources`], [`search`], [`ask`] | CLI command runners |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod context;
pub mod entities;
pub mod library;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod search;
pub mod session;
pub mod sources;
pub mod text;
