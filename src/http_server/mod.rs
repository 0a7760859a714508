//! HTTP front door: event intake, tenant routing and a small management API.

mod auth;
mod error;
mod ingest;
mod management;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router as HttpRouter,
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
pub use error::ApiError;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::Router,
    persistence::{error::PersistenceError, traits::DeliveryStore},
};

/// Shared state of every handler.
#[derive(Clone)]
pub struct ApiState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The event router.
    pub router: Arc<Router>,
    /// Delivery statistics and API keys.
    pub store: Arc<dyn DeliveryStore>,
    /// Bearer token required by the management endpoints.
    pub api_key: Arc<str>,
}

/// Errors that stop the server from running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address is not a socket address.
    #[error("Invalid listen address '{address}': {source}")]
    InvalidAddress {
        /// The configured address.
        address: String,
        /// The parse error.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Binding or serving failed.
    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Returns the API key of `tenant`, generating one on first use.
pub async fn ensure_api_key(
    store: &dyn DeliveryStore,
    tenant: &str,
) -> Result<String, PersistenceError> {
    if let Some(key) = store.get_api_key(tenant).await? {
        return Ok(key);
    }
    let key = store.generate_and_store_api_key(tenant).await?;
    tracing::info!(tenant, "Generated a new API key for the management endpoints.");
    Ok(key)
}

/// Builds the axum application.
pub fn app(state: ApiState) -> HttpRouter {
    let management = HttpRouter::new()
        .route("/reload", post(management::reload))
        .route("/events", get(management::recent_events))
        .route("/stats", get(management::stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth));

    HttpRouter::new()
        .route("/", post(ingest::handle_event))
        .route("/tenant/{route}", post(ingest::handle_tenant_event))
        .route("/health", get(health))
        .merge(management)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .with_state(state)
}

/// Serves the API on the configured address until `shutdown` is cancelled.
pub async fn run_server_from_config(
    state: ApiState,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let address = state.config.server.listen_address.clone();
    let addr: SocketAddr = address
        .parse()
        .map_err(|source| ServerError::InvalidAddress { address: address.clone(), source })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "HTTP server listening.");

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("HTTP server stopped.");
    Ok(())
}
