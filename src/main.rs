//! # ragkit CLI
//!
//! The `ragkit` binary drives the retrieval pipeline: ingesting a documents
//! directory into the vector store, querying it, and inspecting or clearing
//! the persisted store.
//!
//! ## Usage
//!
//! ```bash
//! ragkit --config ./ragkit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragkit ingest` | Load, chunk, embed, and index the documents directory |
//! | `ragkit query "<text>"` | Retrieve ranked chunks for a query |
//! | `ragkit stats` | Show store entry count, dimension, and artifact sizes |
//! | `ragkit clear --yes` | Delete the persisted store artifacts |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragkit::{config, ingest, query, stats};

/// ragkit — a local-first retrieval pipeline for RAG.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with `[store]`, `[chunking]`, `[retrieval]`, `[embedding]`, and
/// `[documents]` sections.
#[derive(Parser)]
#[command(
    name = "ragkit",
    about = "ragkit — chunk, embed, index, and retrieve document context",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./ragkit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest the documents directory into the vector store.
    ///
    /// Loads supported files, chunks them on semantic boundaries, embeds
    /// the chunks in batches, and appends to the persisted index.
    Ingest {
        /// Start from an empty index instead of loading the existing store.
        #[arg(long)]
        clear: bool,

        /// Show document and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of documents to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Retrieve ranked chunks for a query.
    ///
    /// Embeds the query, searches the store, filters by the configured
    /// score threshold, and prints ranked results with sources.
    Query {
        /// The query text.
        query: String,

        /// Override the configured number of candidates.
        #[arg(long)]
        top_k: Option<usize>,

        /// Override the configured context token budget.
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Also print the assembled context block.
        #[arg(long)]
        show_context: bool,
    },

    /// Show store statistics.
    Stats,

    /// Delete the persisted store artifacts.
    Clear {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            clear,
            dry_run,
            limit,
        } => {
            ingest::run_ingest(&cfg, clear, dry_run, limit).await?;
        }
        Commands::Query {
            query,
            top_k,
            max_tokens,
            show_context,
        } => {
            query::run_query(&cfg, &query, top_k, max_tokens, show_context).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Clear { yes } => {
            ingest::run_clear(&cfg, yes)?;
        }
    }

    Ok(())
}
