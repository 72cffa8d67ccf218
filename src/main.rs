//! # NoteBot CLI (`notebot`)
//!
//! The `notebot` binary chats with a git-hosted markdown notes collection:
//! it clones the repository, builds a local vector index of note chunks, and
//! answers questions interactively with retrieved notes as context.
//!
//! ## Usage
//!
//! ```bash
//! notebot [--config ./notebot.toml] [<command>]
//! ```
//!
//! Running with no command starts the chat. On first run (no checkout and no
//! index) the ingestion pipeline runs automatically; afterwards the cached
//! state is reused until it is deleted or rebuilt with `ingest --force`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `notebot chat` | Ingest if needed, then start the interactive chat |
//! | `notebot ingest` | Build the checkout and index (no-op if both exist) |
//! | `notebot ingest --force` | Delete local state and rebuild from scratch |
//! | `notebot search "<query>"` | Show what retrieval returns for a query |
//! | `notebot status` | Show checkout/index state and counts |
//!
//! ## Examples
//!
//! ```bash
//! # Chat with the default notes repository
//! notebot
//!
//! # Chat with a different repository
//! notebot --note-repo-url https://github.com/you/notes.git chat
//!
//! # Provide the API key on the command line instead of OPENAI_API_KEY/.env
//! notebot --openai-api-key sk-... chat
//!
//! # Inspect retrieval for a query
//! notebot search "kubernetes deployment" --limit 8
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use notebot::chat::NoteBot;
use notebot::config::{self, Overrides};
use notebot::index::NoteIndex;
use notebot::ingest;
use notebot::llm::OpenAiChat;
use notebot::search;
use notebot::shell;
use notebot::status;

/// NoteBot — a retrieval-augmented chat assistant for a git-hosted markdown
/// notes collection.
#[derive(Parser)]
#[command(
    name = "notebot",
    about = "Chat with a git-hosted markdown notes collection",
    version,
    long_about = "NoteBot clones a notes repository, splits its markdown files into chunks, \
    embeds them into a local vector index, and answers questions interactively by retrieving \
    the most relevant chunks and sending them, with the conversation so far, to a hosted \
    chat-completion model."
)]
struct Cli {
    /// Path to the optional settings file (TOML). Missing file means
    /// defaults.
    #[arg(long, global = true, default_value = "./notebot.toml")]
    config: PathBuf,

    /// URL of the git repository to load notes from.
    #[arg(long, global = true)]
    note_repo_url: Option<String>,

    /// Language model backend. Currently only `gpt` is accepted.
    #[arg(long, global = true)]
    llm: Option<String>,

    /// OpenAI API key. Falls back to the OPENAI_API_KEY environment variable,
    /// then a local .env file. Never validated before first use.
    #[arg(long, global = true)]
    openai_api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat (the default command).
    ///
    /// Runs ingestion first if either the note checkout or the index is
    /// missing, then answers questions until the shell is closed.
    Chat,

    /// Build the note checkout and vector index.
    ///
    /// Without `--force` this is a no-op when both already exist — local
    /// state is existence-checked, never validated, so rebuilding requires
    /// deleting it.
    Ingest {
        /// Delete the checkout and index first, then rebuild.
        #[arg(long)]
        force: bool,
    },

    /// Show the chunks retrieval would return for a query.
    Search {
        /// The query string.
        query: String,

        /// Maximum number of chunks to show (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show checkout/index state, counts, and the recorded embedding model.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let overrides = Overrides {
        note_repo_url: cli.note_repo_url,
        llm: cli.llm,
        openai_api_key: cli.openai_api_key,
    };
    let cfg = config::load_config(&cli.config, &overrides)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            if ingest::needs_ingest(&cfg) {
                ingest::run_ingest(&cfg).await?;
            }

            let index = NoteIndex::open(&cfg).await?;
            let llm = OpenAiChat::new(&cfg)?;
            let bot = NoteBot::new(cfg.clone(), index, Box::new(llm));
            shell::run_shell(bot).await?;
        }
        Commands::Ingest { force } => {
            if force {
                remove_local_state(&cfg)?;
            } else if !ingest::needs_ingest(&cfg) {
                println!(
                    "Checkout and index already exist — nothing to do (use --force to rebuild)."
                );
                return Ok(());
            }
            ingest::run_ingest(&cfg).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}

/// Delete the checkout and the index (including SQLite sidecar files).
fn remove_local_state(cfg: &config::Config) -> anyhow::Result<()> {
    let notes_path = cfg.notes_path();
    if notes_path.exists() {
        std::fs::remove_dir_all(&notes_path)?;
    }

    let index_path = cfg.index_path();
    for suffix in ["", "-wal", "-shm"] {
        let path = PathBuf::from(format!("{}{}", index_path.display(), suffix));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }

    Ok(())
}
