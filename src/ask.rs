//! `dmdesk ask` and `dmdesk chat`.
//!
//! Both drive a [`Session`] against a loaded [`Library`]; `chat` keeps the
//! session alive across lines read from stdin.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::library::Library;
use crate::llm::ChatModel;
use crate::models::{Focus, Mode};
use crate::session::{Reply, Session};

/// Render a reply with its numbered source list.
pub fn render_reply(reply: &Reply) -> String {
    let mut out = format!("{}\n", reply.content.trim_end());
    if !reply.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in reply.sources.iter().enumerate() {
            let heading = source
                .heading
                .as_deref()
                .map(|h| format!(" – {}", h))
                .unwrap_or_default();
            out.push_str(&format!("  [{}] {}{}\n", i + 1, source.file_name, heading));
        }
    }
    out
}

pub async fn run_ask(
    session: &mut Session,
    library: &Library,
    query: &str,
    model: Option<&dyn ChatModel>,
) -> Result<()> {
    let reply = session.ask(library, query, model).await?;
    if let Some(status) = &reply.status {
        eprintln!("warning: {}", status);
    }
    print!("{}", render_reply(&reply));
    Ok(())
}

/// A line typed in chat that changes the session instead of asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    Clear,
    Mode(Mode),
    Focus(Focus),
    Ask(String),
    Empty,
    Invalid(String),
}

pub fn parse_chat_line(line: &str) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return ChatCommand::Ask(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("q" | "quit" | "exit"), None) => ChatCommand::Quit,
        (Some("clear"), None) => ChatCommand::Clear,
        (Some("mode"), Some(value)) => match value.parse() {
            Ok(mode) => ChatCommand::Mode(mode),
            Err(e) => ChatCommand::Invalid(e.to_string()),
        },
        (Some("focus"), Some(value)) => match value.parse() {
            Ok(focus) => ChatCommand::Focus(focus),
            Err(e) => ChatCommand::Invalid(e.to_string()),
        },
        _ => ChatCommand::Invalid(format!("unknown command: {}", line)),
    }
}

pub async fn run_chat(session: &mut Session, library: &Library, model: Option<&dyn ChatModel>) -> Result<()> {
    eprintln!(
        "dmdesk chat ({} mode, focus {}). Commands: :mode <rules|story>, :focus <focus>, :clear, :quit",
        session.settings.mode, session.settings.focus
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_chat_line(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Empty => {}
            ChatCommand::Clear => {
                session.clear();
                eprintln!("conversation cleared");
            }
            ChatCommand::Mode(mode) => {
                session.settings.mode = mode;
                eprintln!("mode: {}", mode);
            }
            ChatCommand::Focus(focus) => {
                session.settings.focus = focus;
                eprintln!("focus: {}", focus);
            }
            ChatCommand::Invalid(msg) => eprintln!("{}", msg),
            ChatCommand::Ask(query) => match session.ask(library, &query, model).await {
                Ok(reply) => {
                    if let Some(status) = &reply.status {
                        eprintln!("warning: {}", status);
                    }
                    println!("{}", render_reply(&reply));
                }
                Err(e) => eprintln!("{}", e),
            },
        }
    }

    debug!(turns = session.turns().len(), "chat ended");
    Ok(())
}
