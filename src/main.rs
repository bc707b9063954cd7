//! # vaultsearch CLI (`vsearch`)
//!
//! ```bash
//! vsearch --config ./config/vaultsearch.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vsearch index` | Index new and modified notes, drop deleted ones |
//! | `vsearch search "<query>"` | Rank note chunks against a query |
//! | `vsearch ask "<question>"` | Answer a question from the best-matching notes |
//! | `vsearch remove <path>` | Drop one note from the index |
//! | `vsearch stats` | Show index size and snapshot state |
//! | `vsearch serve` | Start the HTTP server |
//! | `vsearch completions <shell>` | Print a shell completion script |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vaultsearch::{config, ingest, search, server, stats};

/// Semantic search over a folder of Markdown notes.
#[derive(Parser)]
#[command(
    name = "vsearch",
    about = "Semantic search and question answering over a Markdown vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vaultsearch.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the vault.
    ///
    /// Notes modified since they were last indexed are re-chunked and
    /// re-embedded; notes deleted from disk are removed from the index.
    Index {
        /// Clear the index and embed every note again.
        #[arg(long)]
        full: bool,
    },

    /// Search indexed notes.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to `[retrieval].limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the rerank pass.
        #[arg(long)]
        no_rerank: bool,
    },

    /// Answer a question using the best-matching notes as context.
    Ask {
        /// The question.
        question: String,
    },

    /// Remove one note from the index.
    Remove {
        /// Vault-relative path, as shown by `search`.
        path: String,
    },

    /// Show index statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("VAULTSEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "vsearch",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { full } => ingest::run_index(&cfg, full).await?,
        Commands::Search {
            query,
            limit,
            no_rerank,
        } => search::run_search(&cfg, &query, limit, no_rerank).await?,
        Commands::Ask { question } => search::run_ask(&cfg, &question).await?,
        Commands::Remove { path } => ingest::run_remove(&cfg, &path).await?,
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from(["vsearch", "search", "fox", "--limit", "3", "--no-rerank"])
            .unwrap();
        match cli.command {
            Commands::Search {
                query,
                limit,
                no_rerank,
            } => {
                assert_eq!(query, "fox");
                assert_eq!(limit, Some(3));
                assert!(no_rerank);
            }
            _ => panic!("expected search"),
        }
    }
}
