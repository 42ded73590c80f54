//! HTTP gateway server.

use crate::error::GatewayError;
use crate::handlers;
use crate::Result;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use shopassist_agent::ChatOrchestrator;
use shopassist_catalog::EmbeddingIndexer;
use shopassist_core::config::{BindMode, GatewayConfig};
use shopassist_core::{SecretString, StoreRepository};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Response header carrying the resolved session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared state handed to every handler.
pub struct GatewayState {
    /// Chat orchestrator.
    pub orchestrator: Arc<ChatOrchestrator>,

    /// Embedding maintenance job.
    pub indexer: Arc<EmbeddingIndexer>,

    /// Tenant records.
    pub stores: Arc<dyn StoreRepository>,

    /// Bearer token granting store-owner access. Admin access is off without it.
    pub admin_token: Option<SecretString>,
}

impl GatewayState {
    /// Whether the request carries a valid admin bearer token.
    ///
    /// A request without an `Authorization` header is simply not an admin.
    /// A header that is present but wrong is rejected.
    pub fn is_admin(&self, headers: &HeaderMap) -> Result<bool> {
        check_bearer(self.admin_token.as_ref(), headers)
    }

    /// Require store-owner access.
    pub fn require_admin(&self, headers: &HeaderMap) -> Result<()> {
        if self.is_admin(headers)? {
            Ok(())
        } else {
            Err(GatewayError::auth("Admin authentication required"))
        }
    }
}

/// The HTTP gateway.
pub struct Gateway {
    state: Arc<GatewayState>,
    config: GatewayConfig,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(config: GatewayConfig, state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    /// Get the shared state.
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health))
            .route("/api/chat", post(handlers::chat::chat))
            .route("/api/conversation", get(handlers::conversation::history))
            .route(
                "/api/products/embeddings",
                post(handlers::embeddings::run).get(handlers::embeddings::status),
            )
            .route("/api/store/ai-config", put(handlers::store::update_ai_config))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors_layer(&self.config)),
            )
    }

    /// Get the bind address.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((self.config.bind.ip(), self.config.port))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_address();

        if self.config.bind != BindMode::Loopback {
            warn!("Gateway is binding to {} and is reachable from the network", addr);
            if self.state.admin_token.is_none() {
                warn!("No admin token configured; admin endpoints are disabled");
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Starting gateway server on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("Gateway stopped");
        Ok(())
    }
}

fn check_bearer(expected: Option<&SecretString>, headers: &HeaderMap) -> Result<bool> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(false);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| GatewayError::auth("Expected a Bearer token"))?;

    match expected {
        Some(expected) if !expected.is_empty() => {
            if expected.matches(token) {
                Ok(true)
            } else {
                Err(GatewayError::auth("Invalid authentication token"))
            }
        }
        _ => Err(GatewayError::Forbidden(
            "Admin access is not enabled".to_string(),
        )),
    }
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
        .max_age(std::time::Duration::from_secs(3600));

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
