//! # Policy Index CLI (`policyctx`)
//!
//! Builds a searchable index over a directory of policy PDFs and answers
//! questions against it.
//!
//! ## Usage
//!
//! ```bash
//! policyctx --config ./config/policy.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `policyctx build` | Reconcile the ledger, extract, chunk, embed, and save the index |
//! | `policyctx ask "<question>"` | Answer a question from the index |
//! | `policyctx ledger` | List ledger entries with review status |
//! | `policyctx export` | Write indexed document metadata as CSV |
//! | `policyctx serve` | Start the HTTP query service |
//!
//! ## Examples
//!
//! ```bash
//! # Build, prompting for any PDF missing from the ledger
//! policyctx build
//!
//! # Unattended build: skip unknown PDFs and list them in the summary
//! policyctx build --resolve defer --progress json
//!
//! # Ask against a running server
//! policyctx ask "Who may remove sutures?" --remote http://127.0.0.1:8000
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use policy_index::progress::ProgressMode;
use policy_index::resolver::ResolveMode;
use policy_index::{ask, config, export, ingest, ledger, server};

/// Policy Index CLI: build and query a metadata-aware index of policy PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/policy.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "policyctx",
    about = "Policy Index: build and query a metadata-aware index of policy PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/policy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from the document root.
    ///
    /// Loads the metadata ledger, resolves PDFs that have no entry,
    /// extracts text (with OCR for image-only pages), chunks it, and writes
    /// the ledger and index. Files that fail to extract are skipped and
    /// listed in the summary.
    Build {
        /// Report file and chunk counts without writing the ledger or index.
        /// Unknown files are deferred instead of prompted.
        #[arg(long)]
        dry_run: bool,

        /// What to do with a PDF that has no ledger entry.
        #[arg(long, value_enum, default_value = "interactive")]
        resolve: ResolveMode,

        /// Progress output on stderr. Defaults to `human` on a terminal, otherwise `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer a question from the index.
    Ask {
        question: String,

        /// Number of passages to retrieve (defaults to `[index].top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Ask a running `policyctx serve` instance instead of the local index.
        #[arg(long)]
        remote: Option<String>,
    },

    /// List ledger entries with their review status.
    Ledger,

    /// Export indexed document metadata as CSV (stdout unless `--output`).
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP query service on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Remote questions only need the timeout; use defaults when no config file exists.
    if let Commands::Ask {
        question,
        remote: Some(url),
        ..
    } = &cli.command
    {
        let cfg = if cli.config.exists() {
            config::load_config(&cli.config)?
        } else {
            config::Config::minimal()
        };
        ask::run_ask_remote(&cfg, url, question).await?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            dry_run,
            resolve,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_build(&cfg, dry_run, resolve, mode).await?;
        }
        Commands::Ask {
            question, limit, ..
        } => {
            ask::run_ask(&cfg, &question, limit).await?;
        }
        Commands::Ledger => {
            ledger::run_list(&cfg)?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref())?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
