//! # Context Memory CLI (`ctxmem`)
//!
//! The `ctxmem` binary is the primary interface for the context-memory
//! store. It provides commands for store initialization, document
//! ingestion, context retrieval, summarization, and maintenance.
//!
//! ## Usage
//!
//! ```bash
//! ctxmem --config ./config/ctxmem.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxmem init` | Create the SQLite store and run schema migrations |
//! | `ctxmem save "<content>"` | Save a document, superseding prior versions |
//! | `ctxmem retrieve "<query>"` | Retrieve relevant context for a query |
//! | `ctxmem get <id>` | Print a full stored record by id |
//! | `ctxmem rollup` | Roll eligible weekly groups up into summaries |
//! | `ctxmem compact` | Run the scheduled compaction pass |
//! | `ctxmem stats` | Print a store health overview |

mod config;
mod db;
mod embedding;
mod get;
mod index;
mod maintenance;
mod migrate;
mod models;
#[allow(dead_code)]
mod profile;
mod retrieval;
mod rollup;
mod stats;
mod store;
mod summary;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Context Memory CLI — a hierarchical context-memory store for
/// long-running AI assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "ctxmem",
    about = "Context Memory — a hierarchical context-memory store for long-running AI assistants",
    version,
    long_about = "Context Memory persists free-text knowledge as embedded documents with a full \
    lifecycle: versions supersede each other with delta records, weekly groups roll up into \
    summaries, and retrieval prefers the summary tier before falling back to raw documents."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ctxmem.toml`. Store, retrieval, maintenance,
    /// and embedding settings are read from this file.
    #[arg(long, global = true, default_value = "./config/ctxmem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema.
    ///
    /// Creates the SQLite database under the configured store path and all
    /// required tables. This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Save a document.
    ///
    /// Embeds the content and persists it with lifecycle metadata. When
    /// `--version-id` is given and a prior non-obsolete document exists
    /// for the same `(doc-type, version-id)` key, the prior version is
    /// marked obsolete and a delta record is written. Crossing a
    /// maintenance ceiling triggers a rollup inline.
    Save {
        /// The document body.
        content: String,

        /// Author tag recorded on the document.
        #[arg(long)]
        author: String,

        /// Free-form classification tag (e.g. `code`, `changelog`, `error`).
        #[arg(long)]
        doc_type: String,

        /// Logical-version key; supersedes the prior document with the
        /// same doc-type and version key.
        #[arg(long)]
        version_id: Option<String>,

        /// Extra metadata as `key=value` pairs.
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Retrieve relevant context for a query.
    ///
    /// Queries the summary tier first, then fills the remainder from raw
    /// documents. Results below the score threshold are dropped.
    Retrieve {
        /// The query string.
        query: String,

        /// Maximum number of results (defaults to `retrieval.k`).
        #[arg(long)]
        k: Option<usize>,

        /// Minimum similarity score (defaults to `retrieval.score_threshold`).
        #[arg(long)]
        threshold: Option<f64>,

        /// Print a formatted context block instead of a result list.
        #[arg(long)]
        block: bool,
    },

    /// Print a full stored record by id.
    ///
    /// Obsolete and archived records stay addressable here even though
    /// retrieval excludes them.
    Get {
        /// Document id.
        id: String,
    },

    /// Roll eligible weekly groups up into summaries.
    ///
    /// Groups live documents by ISO week and doc-type; groups of three or
    /// more are summarized and their sources archived.
    Rollup,

    /// Run the scheduled compaction pass.
    ///
    /// Intended for a cron-like schedule. Condenses and archives the
    /// least-recently-used half of the stale documents once the store
    /// exceeds its compaction ceiling.
    Compact,

    /// Print a store health overview.
    Stats,
}

/// Parse a `key=value` pair for `--meta` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized successfully.");
        }
        Commands::Save {
            content,
            author,
            doc_type,
            version_id,
            meta,
        } => {
            store::run_save(&cfg, content, author, doc_type, version_id, meta).await?;
        }
        Commands::Retrieve {
            query,
            k,
            threshold,
            block,
        } => {
            retrieval::run_retrieve(&cfg, &query, k, threshold, block).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Rollup => {
            rollup::run_rollup(&cfg).await?;
        }
        Commands::Compact => {
            maintenance::run_compact(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
