//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod extract;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "docsift")]
#[command(about = "PDF text and table extraction service")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP extraction service
    Serve {
        /// Address to bind: port, host, or host:port (default from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Extract a local PDF and print the JSON result
    Extract {
        /// PDF file to extract
        file: PathBuf,
        /// Extraction mode: hybrid, text, or tables
        #[arg(short, long, default_value = "hybrid")]
        mode: String,
    },

    /// Show which extraction backends are usable
    Check,
}

/// Parse arguments, load configuration and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_explicit(path).await?,
        None => Config::load().await?,
    };
    if let Some(path) = &config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(config, bind.as_deref()).await,
        Commands::Extract { file, mode } => extract::cmd_extract(config, &file, &mode).await,
        Commands::Check => check::cmd_check(config).await,
    }
}
