mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "dpx")]
#[command(about = "Instrument scrape reconciliation tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the run config, schema and shots, and print a summary
    Check {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,
    },

    /// Feed recorded scrapes through one engine and print new samples as JSON lines
    Replay {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,

        /// JSONL file, one `{"values", "times", "at"?}` object per line
        #[arg(long)]
        snapshots: PathBuf,
    },

    /// Print shots sorted by start time
    Shots {
        #[arg(long)]
        file: PathBuf,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> instrument...)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Loaded before tracing so RUST_LOG may come from it. A missing file is
    // fine; an unreadable or malformed one is reported once tracing is up.
    let dotenv = dotenvy::from_filename(".env.local");

    init_tracing();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "failed to load .env.local");
        }
    }

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Check { config_paths } => commands::check::run(&config_paths),
        Commands::Replay {
            config_paths,
            snapshots,
        } => commands::replay::run(&config_paths, &snapshots),
        Commands::Shots { file } => commands::shots::run(&file),
        Commands::ConfigHash { paths } => {
            let loaded = dpx_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
