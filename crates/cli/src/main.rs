//! Measles guidelines assistant CLI
//!
//! Main entry point for the `measles` command-line tool.
//! Answers questions about measles surveillance guidelines from a local
//! document index.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, BatchCommand, ExamplesCommand, HealthCommand, IndexCommand};
use measles_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Measles guidelines assistant - grounded answers from surveillance guidelines
#[derive(Parser, Debug)]
#[command(name = "measles")]
#[command(about = "Answer questions about measles surveillance guidelines", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "MEASLES_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MEASLES_CONFIG")]
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

    /// Completion provider (ollama, openai)
    #[arg(short, long, global = true, env = "MEASLES_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "MEASLES_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question about the guidelines
    Ask(AskCommand),

    /// Answer several questions in order
    Batch(BatchCommand),

    /// Load or rebuild the guideline index
    Index(IndexCommand),

    /// Report model and index readiness
    Health(HealthCommand),

    /// List example questions
    Examples(ExamplesCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file select the YAML to merge
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())
        .context("Failed to load configuration")?
        .with_overrides(
            cli.workspace,
            cli.config,
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Measles guidelines assistant starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config
        .ensure_state_dir()
        .context("Failed to create state directory")?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Batch(_) => "batch",
        Commands::Index(_) => "index",
        Commands::Health(_) => "health",
        Commands::Examples(_) => "examples",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Batch(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
        Commands::Examples(cmd) => cmd.execute(),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed ({}): {}", e.kind(), e),
    }

    result.with_context(|| format!("measles {} failed", command_name))
}
