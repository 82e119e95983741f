//! clauseseek CLI: build, query, serve and evaluate a contract retrieval index.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// clauseseek: retrieval and risk tagging over contracts and insurance policies
#[derive(Parser, Debug)]
#[command(name = "clauseseek", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path (replaces user and workspace config files)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build an index from a directory of documents
    Ingest {
        /// Directory of source documents
        source_dir: PathBuf,
        /// Output index directory (defaults to index.dir from config)
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Directory of pre-extracted `<stem>.txt` files
        #[arg(long)]
        sidecar_dir: Option<PathBuf>,
    },
    /// Show the chunks closest to a question
    Search {
        question: String,
        /// Number of results
        #[arg(short)]
        k: Option<usize>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Answer a question from the indexed documents
    Ask {
        question: String,
        /// Candidate pool size
        #[arg(long)]
        top_k: Option<usize>,
        /// Chunks used for the answer
        #[arg(long)]
        return_k: Option<usize>,
        /// Also ask the configured generative model
        #[arg(long)]
        generate: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Score predictions against gold answers (JSON Lines)
    Eval { gold: PathBuf, pred: PathBuf },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .clauseseek/config.toml in the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "clauseseek", "clauseseek")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "clauseseek.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = match &cli.config {
        Some(path) => clauseseek_core::config::load_config_file(path),
        None => clauseseek_core::config::load_config(Some(&workspace), None),
    }
    .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.validate()?;
    tracing::debug!(workspace = %workspace.display(), "Loaded configuration");

    commands::handle_command(cli.command, config, &workspace).await
}
