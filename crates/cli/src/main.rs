//! Agrisearch CLI
//!
//! Main entry point for the agrisearch command-line tool.
//! Answers agricultural questions with cited, evidence-backed research.

mod commands;

use agrisearch_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppResult,
};
use clap::{Parser, Subcommand};
use commands::{AskCommand, ModelsCommand, PromptsCommand, RouteCommand};
use std::path::PathBuf;

/// Agrisearch - cited answers to agricultural questions
#[derive(Parser, Debug)]
#[command(name = "agrisearch")]
#[command(about = "Cited answers to agricultural questions from a corpus and the web", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "AGRISEARCH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "AGRISEARCH_CONFIG")]
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

    /// Text-completion provider (ollama, openai)
    #[arg(short, long, global = true, env = "AGRISEARCH_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "AGRISEARCH_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Research a question and print a cited answer
    Ask(AskCommand),

    /// Show which specialization a query routes to
    Route(RouteCommand),

    /// List models available from the provider
    Models(ModelsCommand),

    /// List or show the prompts in use
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let mut config = AppConfig::load()?;

    // An explicit --config file is merged before other overrides
    if let Some(path) = &cli.config {
        config = config.merge_yaml(path)?;
    }

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(
        config.log_level.as_deref(),
        config.no_color,
        LogFormat::parse(&config.log_format),
    )?;

    tracing::info!("Agrisearch CLI starting");
    tracing::debug!(workspace = ?config.workspace, provider = %config.provider, model = %config.model);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Route(_) => "route",
        Commands::Models(_) => "models",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Route(cmd) => cmd.execute(&config),
        Commands::Models(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
