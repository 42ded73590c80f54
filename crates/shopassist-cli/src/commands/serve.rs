//! Serve command.

use super::{embedding_client, indexer, with_storage};
use anyhow::Context;
use clap::Args;
use shopassist_agent::{
    ChatOrchestrator, PromptBuilder, RuntimeConfig, SearchProductsTool, ToolRegistry,
};
use shopassist_catalog::{EmbeddingClient, RetrievalEngine};
use shopassist_core::config::BindMode;
use shopassist_core::Config;
use shopassist_gateway::{Gateway, GatewayState};
use shopassist_providers::OpenAIProvider;
use shopassist_storage::Storage;
use std::sync::Arc;
use tracing::{info, warn};

/// Serve command arguments.
#[derive(Args)]
pub struct ServeArgs {
    /// Port number (overrides gateway.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind mode: loopback or lan (overrides gateway.bind)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind = match bind.as_str() {
            "loopback" => BindMode::Loopback,
            "lan" => BindMode::Lan,
            other => anyhow::bail!("Invalid bind mode: {}. Valid options: loopback, lan", other),
        };
    }

    with_storage(&config, |storage| serve(&config, storage)).await
}

async fn serve(config: &Config, storage: Storage) -> anyhow::Result<()> {
    let provider = OpenAIProvider::from_config(&config.openai)
        .context("Chat needs an OpenAI API key; set openai.api_key or OPENAI_API_KEY")?;
    let embeddings = embedding_client(config)?;
    if !embeddings.is_configured() {
        warn!("No embedding credential; semantic search will report failures");
    }

    let engine = RetrievalEngine::new(storage.catalog.clone(), embeddings.clone())
        .with_default_max_results(config.assistant.default_max_results);
    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(Arc::new(SearchProductsTool::new(Arc::new(engine))))
        .await;

    let orchestrator = ChatOrchestrator::new(
        Arc::new(provider),
        tools,
        storage.stores.clone(),
        storage.conversations.clone(),
        storage.catalog.clone(),
    )
    .with_config(RuntimeConfig::from(&config.assistant))
    .with_prompt(PromptBuilder::from(&config.assistant));

    let state = GatewayState {
        orchestrator: Arc::new(orchestrator),
        indexer: Arc::new(indexer(config, &storage, embeddings)),
        stores: storage.stores.clone(),
        admin_token: config.gateway.admin_token.clone(),
    };

    info!(
        model = %config.assistant.model,
        max_steps = config.assistant.max_steps,
        "Assistant ready"
    );

    Gateway::new(config.gateway.clone(), state)
        .run_until(shutdown_signal())
        .await
        .context("Gateway failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
