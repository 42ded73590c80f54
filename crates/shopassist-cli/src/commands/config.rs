//! Configuration management commands.

use clap::{Args, Subcommand};
use shopassist_core::{Config, ConfigError};
use std::path::{Path, PathBuf};

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub fn run(
    args: ConfigArgs,
    path: Option<&Path>,
    loaded: Result<Config, ConfigError>,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", loaded?.to_json5()?);
        }

        ConfigCommand::Validate => match loaded {
            Ok(_) => println!("Configuration is valid"),
            Err(e) => anyhow::bail!("Invalid configuration: {}", e),
        },

        ConfigCommand::Path => {
            let path = match path {
                Some(p) => PathBuf::from(p),
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}
