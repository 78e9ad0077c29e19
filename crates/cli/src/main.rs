//! Tellerbot CLI: the main entry point.
//!
//! Commands:
//! - `serve`    : Start the HTTP API server
//! - `chat`     : Single-message or interactive chat
//! - `pricing`  : Show the model pricing table
//! - `estimate` : Estimate the cost of a call
//! - `status`   : Show configuration and probe dependencies
//! - `config`   : Print the default configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tellerbot",
    about = "Tellerbot: budget-aware chat proxy for a banking advisor",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the advisor
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Show model pricing (USD per 1K tokens)
    Pricing,

    /// Estimate the cost of a completion
    Estimate {
        #[arg(long, default_value = "gpt-3.5-turbo")]
        model: String,

        /// Prompt tokens
        #[arg(long)]
        input: u32,

        /// Completion tokens
        #[arg(long)]
        output: u32,
    },

    /// Show configuration and dependency health
    Status,

    /// Print the default configuration as TOML
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            conversation,
        } => commands::chat::run(message, conversation).await?,
        Commands::Pricing => commands::usage::pricing().await?,
        Commands::Estimate {
            model,
            input,
            output,
        } => commands::usage::estimate(&model, input, output).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Config { path } => commands::config_cmd::run(path).await?,
    }

    Ok(())
}
