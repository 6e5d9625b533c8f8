//! CryptoShow CLI - command-line front end for CryptoShow sessions
//!
//! This CLI provides a `cshow` command that submits structures for pocket
//! analysis, opens results in a headless scene, runs comparison searches and
//! animates candidates.

mod commands;

use clap::{Parser, Subcommand};
use cryptoshow_abstraction::Style;
use cryptoshow_core::{CandidateSortField, SessionConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// CryptoShow CLI - cryptic binding site analysis sessions
#[derive(Parser, Debug)]
#[command(
    name = "cshow",
    author,
    version,
    about = "CryptoShow - cryptic binding site analysis sessions",
    long_about = "CryptoShow (cshow) submits protein structures for cryptic pocket prediction,\nopens the results as a scene and overlays related apo/holo structures."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error); defaults to the configured level or info
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Backend API base URL (overrides configuration files and CRYPTOSHOW_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a structure for analysis
    ///
    /// Sends a PDB identifier or an uploaded file, follows the job to
    /// completion and opens the result.
    Submit {
        /// PDB identifier (e.g. 2RFC)
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        pdb_id: Option<String>,

        /// Structure file to upload instead
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Open a finished analysis
    View {
        /// Analysis task ID
        task_id: String,

        /// Visible polymer style (cartoon, ball-and-stick, backbone, molecular-surface)
        #[arg(long)]
        polymer_style: Option<Style>,

        /// Visible pocket style (cartoon, ball-and-stick, molecular-surface)
        #[arg(long)]
        pocket_style: Option<Style>,

        /// Show a single pocket; all pockets otherwise
        #[arg(long)]
        pocket: Option<u32>,
    },

    /// Search for related apo and holo structures of a pocket
    Compare {
        /// Analysis task ID
        task_id: String,

        /// Pocket to build the query from
        #[arg(long)]
        pocket: u32,

        /// Explicit query ("{structure} {chain} {residue} {number}")
        #[arg(long)]
        query: Option<String>,

        /// Sort candidates by pdb_id, kind, rmsd, sasa, chains or ligands
        #[arg(long)]
        sort: Option<CandidateSortField>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Output candidates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Animate the transition toward a comparison candidate
    Animate {
        /// Analysis task ID
        task_id: String,

        /// Comparison job ID
        #[arg(long)]
        job: String,

        /// Candidate index as listed by `compare`
        #[arg(long)]
        candidate: usize,

        /// Sort order the index refers to
        #[arg(long)]
        sort: Option<CandidateSortField>,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; CLI flags take precedence
    let mut config = SessionConfig::discover_and_load();
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }

    // Initialize tracing: --log-level, then RUST_LOG, then the configured level
    let filter = match args.log_level {
        Some(level) => EnvFilter::new(level_directive(&level)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(level_directive(config.log_level.as_deref().unwrap_or_default()))
        }),
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    config.validate()?;

    match args.command {
        Command::Submit { pdb_id, file } => commands::submit::execute(&config, pdb_id, file).await,
        Command::View { task_id, polymer_style, pocket_style, pocket } => {
            commands::view::execute(&config, &task_id, polymer_style, pocket_style, pocket).await
        }
        Command::Compare { task_id, pocket, query, sort, desc, json } => {
            commands::compare::execute(&config, &task_id, pocket, query, sort, desc, json).await
        }
        Command::Animate { task_id, job, candidate, sort, desc } => {
            commands::animate::execute(&config, &task_id, &job, candidate, sort, desc).await
        }
    }
}

/// Maps a level name to a filter directive; unknown names mean info.
fn level_directive(name: &str) -> &'static str {
    let level = match name {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    level.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("debug"), "DEBUG");
        assert_eq!(level_directive("error"), "ERROR");
        assert_eq!(level_directive("verbose"), "INFO");
        assert_eq!(level_directive(""), "INFO");
        assert!(EnvFilter::try_new(level_directive("warn")).is_ok());
    }
}
