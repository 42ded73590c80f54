//! Embedding maintenance commands.

use super::{embedding_client, indexer, with_storage};
use clap::{Args, Subcommand};
use shopassist_core::Config;
use tracing::info;

/// Embeddings command arguments.
#[derive(Args)]
pub struct EmbeddingsArgs {
    #[command(subcommand)]
    pub command: EmbeddingsCommand,
}

#[derive(Subcommand)]
pub enum EmbeddingsCommand {
    /// Embed one batch of products that have no embedding yet
    Generate {
        /// Store domain
        #[arg(long)]
        store: String,

        /// Batch size (defaults to embeddings.batch_size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Clear all embeddings for a store and rebuild them
    Regenerate {
        /// Store domain
        #[arg(long)]
        store: String,
    },

    /// Show embedding coverage for a store
    Status {
        /// Store domain
        #[arg(long)]
        store: String,
    },
}

/// Run the embeddings command.
pub async fn run(args: EmbeddingsArgs, config: &Config) -> anyhow::Result<()> {
    let embeddings = embedding_client(config)?;

    with_storage(config, |storage| async move {
        let indexer = indexer(config, &storage, embeddings);

        let output = match args.command {
            EmbeddingsCommand::Generate { store, limit } => {
                let report = match limit {
                    Some(limit) => indexer.run_batch(&store, limit).await?,
                    None => indexer.generate(&store).await?,
                };
                info!(store_id = %store, embedded = report.embedded, "Generate finished");
                serde_json::to_string_pretty(&report)?
            }
            EmbeddingsCommand::Regenerate { store } => {
                let report = indexer.regenerate_all(&store).await?;
                info!(store_id = %store, total = report.total_embedded, "Regenerate finished");
                serde_json::to_string_pretty(&report)?
            }
            EmbeddingsCommand::Status { store } => {
                serde_json::to_string_pretty(&indexer.status(&store).await?)?
            }
        };

        println!("{}", output);
        Ok(())
    })
    .await
}
