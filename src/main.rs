//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat [--config docchat.toml] [--verbose] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat inspect <paths..>` | Load documents and print their statistics |
//! | `docchat search "<query>" <paths..>` | Rank chunks against a query |
//! | `docchat ask "<question>" <paths..>` | Answer one question from the documents |
//! | `docchat chat <paths..>` | Interactive chat over the documents |
//! | `docchat analyze <kind> <paths..>` | Summary, key points, sentiment, themes or mind map |
//! | `docchat personalities` | List assistant personalities |
//!
//! Logs go to stderr. `RUST_LOG` overrides the level chosen by `--verbose`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docchat::commands;
use docchat::config;

/// docchat: chat with your own documents.
///
/// Documents are chunked and indexed with TF-IDF in memory; the passages
/// most relevant to each question are sent with it to a language model.
#[derive(Parser)]
#[command(name = "docchat", version, about = "Chat with your own documents")]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents and print per-document statistics.
    Inspect {
        /// Files or directories to load.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Also list every chunk with its character span.
        #[arg(long)]
        chunks: bool,
    },

    /// Rank document chunks against a query.
    ///
    /// Prints chunks with a positive cosine score, best first.
    Search {
        /// Search query.
        query: String,

        /// Files or directories to load.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Maximum number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a single question from the documents.
    Ask {
        /// The question.
        question: String,

        /// Files or directories to load. May be empty with `--session`.
        paths: Vec<PathBuf>,

        /// Personality key (see `docchat personalities`).
        #[arg(long)]
        personality: Option<String>,

        /// Session file to restore before and save after answering.
        #[arg(long)]
        session: Option<PathBuf>,
    },

    /// Interactive chat over the documents, reading questions from stdin.
    Chat {
        /// Files or directories to load. May be empty with `--session`.
        paths: Vec<PathBuf>,

        /// Personality key (see `docchat personalities`).
        #[arg(long)]
        personality: Option<String>,

        /// Session file to restore on start and save on exit.
        #[arg(long)]
        session: Option<PathBuf>,
    },

    /// Run a whole-document analysis: summary, key_points, sentiment, themes or mind_map.
    Analyze {
        /// Analysis kind.
        kind: String,

        /// Files or directories to load.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Personality key (see `docchat personalities`).
        #[arg(long)]
        personality: Option<String>,

        /// Print a mind map as a Mermaid flowchart instead of Markdown.
        #[arg(long)]
        mermaid: bool,
    },

    /// List the available assistant personalities.
    Personalities,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { paths, chunks } => {
            commands::run_inspect(&cfg, &paths, chunks)?;
        }
        Commands::Search {
            query,
            paths,
            limit,
        } => {
            commands::run_search(&cfg, &query, &paths, limit)?;
        }
        Commands::Ask {
            question,
            paths,
            personality,
            session,
        } => {
            commands::run_ask(
                &cfg,
                &question,
                &paths,
                personality.as_deref(),
                session.as_deref(),
            )
            .await?;
        }
        Commands::Chat {
            paths,
            personality,
            session,
        } => {
            commands::run_chat(&cfg, &paths, personality.as_deref(), session.as_deref()).await?;
        }
        Commands::Analyze {
            kind,
            paths,
            personality,
            mermaid,
        } => {
            commands::run_analyze(&cfg, &kind, &paths, personality.as_deref(), mermaid).await?;
        }
        Commands::Personalities => {
            commands::run_personalities(&cfg)?;
        }
    }

    Ok(())
}
