//! Citeflow CLI
//!
//! Main entry point for the citeflow command-line tool.
//! Answers questions from configured document sources with inline citations.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use citeflow_core::{config::AppConfig, logging};
use commands::{AskCommand, ServeCommand, SourcesCommand};
use std::path::PathBuf;

/// Citeflow - retrieval-augmented answers with inline citations
#[derive(Parser, Debug)]
#[command(name = "citeflow")]
#[command(about = "Retrieval-augmented answers with inline citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CITEFLOW_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CITEFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama)
    #[arg(short, long, global = true, env = "CITEFLOW_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "CITEFLOW_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question against a document source
    Ask(AskCommand),

    /// Serve the chat endpoint over HTTP
    Serve(ServeCommand),

    /// List configured document sources
    Sources(SourcesCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and the workspace config file
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())
        .context("Failed to load configuration")?;

    // Apply CLI overrides
    let mut config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.log_json {
        config.json_logs = true;
    }

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("Citeflow CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Serve(_) => "serve",
        Commands::Sources(_) => "sources",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Sources(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(code = e.code(), "Command failed: {}", e),
    }

    result.with_context(|| format!("citeflow {} failed", command_name))
}
