//! Fabrication assistant CLI - main entry point

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use fabrication_bot::{commands, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "fabrication_bot")]
#[command(about = "Soft robotics fabrication assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question
        query: String,

        /// Level of detail: low | medium | high
        #[arg(short, long)]
        confidence: Option<String>,

        /// Combination policy: concatenate_all | first_match | local_first
        #[arg(short, long)]
        policy: Option<String>,
    },

    /// Interactive question loop
    Chat {
        /// Level of detail: low | medium | high
        #[arg(short, long)]
        confidence: Option<String>,
    },

    /// Print the keywords extracted from a query
    Keywords {
        query: String,
    },

    /// Search the local dataset only
    Lookup {
        query: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask { .. } => "ask",
            Commands::Chat { .. } => "chat",
            Commands::Keywords { .. } => "keywords",
            Commands::Lookup { .. } => "lookup",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Logs go to stderr so answers on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fabrication_bot=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = commands::load_config(&cli.config)?;

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(&config, cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(
    config: &fabrication_bot::Config,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Ask {
            query,
            confidence,
            policy,
        } => {
            commands::ask::run(config, &query, confidence.as_deref(), policy.as_deref()).await?;
        }
        Commands::Chat { confidence } => {
            commands::chat::run(config, confidence.as_deref()).await?;
        }
        Commands::Keywords { query } => {
            commands::keywords::run(config, &query)?;
        }
        Commands::Lookup { query } => {
            commands::lookup::run(config, &query)?;
        }
    }

    Ok(())
}
