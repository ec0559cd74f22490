//! # DMDesk CLI (`dmdesk`)
//!
//! Command-line front end for the DMDesk library.
//!
//! ## Usage
//!
//! ```bash
//! dmdesk [--config dmdesk.toml] [--library <dir> | --remote] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dmdesk sources` | List imported documents and their chunk counts |
//! | `dmdesk chunk <file>` | Show how one file is chunked |
//! | `dmdesk search "<query>"` | Rank library chunks for a query |
//! | `dmdesk ask "<query>"` | Answer one question |
//! | `dmdesk chat` | Interactive multi-turn session |
//! | `dmdesk monsters` | List statblocks found in monster manuals |
//! | `dmdesk names` | List class and race names from player books |
//!
//! Logs go to stderr; set `RUST_LOG` or pass `--verbose` for more.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dmdesk::ask::{run_ask, run_chat};
use dmdesk::chunk::chunk_document;
use dmdesk::config::{load_config, Config};
use dmdesk::library::{read_files, Library};
use dmdesk::llm::{ChatModel, OpenAiChat};
use dmdesk::models::{ChunkStrategy, Focus, Mode, Setting};
use dmdesk::search::run_search;
use dmdesk::session::{Session, SessionSettings};
use dmdesk::sources::run_sources;

/// DMDesk: answers from your own D&D markdown library.
#[derive(Parser)]
#[command(name = "dmdesk", version, about = "DMDesk: a Dungeon Master assistant grounded in your own books")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Library directory, overriding `library.root`.
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Fetch the fixed book list from `library.remote_base_url`.
    #[arg(long, global = true)]
    remote: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List imported documents and chunk counts.
    Sources,

    /// Chunk a single markdown file and print the chunks.
    Chunk {
        file: PathBuf,

        /// `by-heading` or `whole-file`.
        #[arg(long)]
        strategy: Option<ChunkStrategy>,

        #[arg(long)]
        max_chunk_size: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Rank library chunks for a query.
    Search {
        query: String,

        #[arg(long)]
        focus: Option<Focus>,

        /// `generic`, `forgotten-realms`, `eberron`, or `ravnica`.
        #[arg(long)]
        setting: Option<Setting>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Answer a single question.
    Ask {
        query: String,

        /// `rules` or `story`.
        #[arg(long)]
        mode: Option<Mode>,

        #[arg(long)]
        focus: Option<Focus>,

        /// Answer rules questions from the books alone.
        #[arg(long)]
        no_llm: bool,
    },

    /// Interactive multi-turn session on stdin.
    Chat {
        #[arg(long)]
        mode: Option<Mode>,

        #[arg(long)]
        focus: Option<Focus>,

        #[arg(long)]
        no_llm: bool,
    },

    /// List statblocks parsed from monster manuals.
    Monsters {
        #[arg(long)]
        json: bool,
    },

    /// List class and race names found in player-facing books.
    Names {
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "dmdesk=debug" } else { "dmdesk=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn session_for(cfg: &Config, mode: Option<Mode>, focus: Option<Focus>, no_llm: bool) -> Session {
    let mut settings = SessionSettings::from_config(cfg);
    if let Some(mode) = mode {
        settings.mode = mode;
    }
    if let Some(focus) = focus {
        settings.focus = focus;
    }
    if no_llm {
        settings.use_llm_for_rules = false;
    }
    Session::new(settings)
}

/// A model client when a key is configured and the caller wants one.
fn model_for(cfg: &Config, no_llm: bool) -> Option<OpenAiChat> {
    if no_llm {
        return None;
    }
    match OpenAiChat::new(&cfg.llm) {
        Ok(model) => Some(model),
        Err(e) => {
            tracing::debug!(error = %e, "no chat model available");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(root) = cli.library {
        cfg.library.root = root;
    }

    // Chunking a single file needs no library.
    if let Commands::Chunk {
        file,
        strategy,
        max_chunk_size,
        json,
    } = &cli.command
    {
        let docs = read_files(std::slice::from_ref(file))?;
        let doc = docs.first().context("no document read")?;
        let chunks = chunk_document(
            doc,
            max_chunk_size.unwrap_or(cfg.chunking.max_chunk_size),
            strategy.unwrap_or(cfg.chunking.strategy),
        );
        if *json {
            println!("{}", serde_json::to_string_pretty(&chunks)?);
        } else {
            for chunk in &chunks {
                println!(
                    "[chunk {}] {} ({}..{})",
                    chunk.chunk_index,
                    chunk.heading.as_deref().unwrap_or(""),
                    chunk.start_offset,
                    chunk.end_offset
                );
                println!("{}", chunk.text);
                println!();
            }
        }
        return Ok(());
    }

    let library = Library::load(&cfg, cli.remote).await?;

    match cli.command {
        Commands::Chunk { .. } => unreachable!(),
        Commands::Sources => run_sources(&library),
        Commands::Search {
            query,
            focus,
            setting,
            limit,
            json,
        } => {
            run_search(
                &library,
                &query,
                focus.unwrap_or(cfg.session.focus),
                setting.unwrap_or(cfg.session.setting),
                limit.unwrap_or(cfg.retrieval.limit_rules),
                json,
            )?;
        }
        Commands::Ask {
            query,
            mode,
            focus,
            no_llm,
        } => {
            let mut session = session_for(&cfg, mode, focus, no_llm);
            let model = model_for(&cfg, no_llm);
            run_ask(&mut session, &library, &query, model.as_ref().map(|m| m as &dyn ChatModel)).await?;
        }
        Commands::Chat { mode, focus, no_llm } => {
            let mut session = session_for(&cfg, mode, focus, no_llm);
            let model = model_for(&cfg, no_llm);
            run_chat(&mut session, &library, model.as_ref().map(|m| m as &dyn ChatModel)).await?;
        }
        Commands::Monsters { json } => {
            let monsters = library.monsters();
            if json {
                println!("{}", serde_json::to_string_pretty(&monsters)?);
            } else if monsters.is_empty() {
                println!("No monsters found.");
            } else {
                for m in &monsters {
                    let stat = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<32} AC {:>3}  HP {:>4}  ({})",
                        m.name,
                        stat(m.armor_class),
                        stat(m.hit_points),
                        m.file_name
                    );
                }
            }
        }
        Commands::Names { json } => {
            let names = library.class_race_names();
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("No class or race names found.");
            } else {
                for name in &names {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}
