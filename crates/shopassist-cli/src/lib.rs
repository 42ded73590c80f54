//! ShopAssist command-line interface.

pub mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shopassist_core::config::{Config, LoggingConfig};
use shopassist_core::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ShopAssist - store-embedded shopping assistant
#[derive(Parser)]
#[command(name = "shopassist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to config file
    #[arg(short, long, env = "SHOPASSIST_CONFIG", global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve(commands::serve::ServeArgs),

    /// Maintain product embeddings
    Embeddings(commands::embeddings::EmbeddingsArgs),

    /// Manage the local product catalog
    Catalog(commands::catalog::CatalogArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `-v` and the configured level.
pub fn init_logging(logging: &LoggingConfig, verbose: u8, json: bool) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},sqlx=warn,hyper=warn")));
    let json = json || logging.json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    env::load_dotenv().context("Failed to read .env")?;

    let loaded = Config::resolve(cli.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(&logging, cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve(args) => {
            let config = loaded.context("Failed to load configuration")?;
            commands::serve::run(args, config).await
        }
        Commands::Embeddings(args) => {
            let config = loaded.context("Failed to load configuration")?;
            commands::embeddings::run(args, &config).await
        }
        Commands::Catalog(args) => {
            let config = loaded.context("Failed to load configuration")?;
            commands::catalog::run(args, &config).await
        }
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref(), loaded),
        Commands::Version => {
            println!("shopassist {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
