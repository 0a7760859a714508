//! The Supervisor manages the lifecycle of waypost.
//!
//! It owns the router, the delivery store and the HTTP server task:
//!
//! - **Initialization**: the `SupervisorBuilder` wires the store, policy
//!   gate and route source into a router and loads the initial routes.
//!   Broken configuration at this point is fatal.
//! - **Lifecycle Management**: `run` spawns the HTTP server and a signal
//!   listener, then waits until either a signal arrives or a task fails.
//! - **Graceful Shutdown**: schedulers are stopped (flushing what they hold)
//!   and outputs terminated, bounded by `shutdown_timeout`.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::{Router, RouterError},
    http_server::{self, ApiState},
    persistence::{error::PersistenceError, traits::DeliveryStore},
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A delivery store was not provided to the `SupervisorBuilder`.
    #[error("Missing delivery store for Supervisor")]
    MissingStore,

    /// The initial routes could not be loaded.
    #[error("Failed to load routes: {0}")]
    Router(#[from] RouterError),

    /// The API key could not be read or created.
    #[error("Failed to prepare the API key: {0}")]
    Persistence(#[from] PersistenceError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// Delivery statistics, API keys and fingerprints.
    store: Arc<dyn DeliveryStore>,

    /// The event router.
    router: Arc<Router>,

    /// Bearer token for the management endpoints.
    api_key: Arc<str>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: tokio::task::JoinSet<()>,
}

impl Supervisor {
    /// Creates a new Supervisor from already wired components.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DeliveryStore>,
        router: Arc<Router>,
        api_key: String,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            router,
            api_key: Arc::from(api_key),
            cancellation_token: CancellationToken::new(),
            join_set: tokio::task::JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The router events are fed into.
    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    /// A token that stops [`Supervisor::run`] when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Runs until a shutdown signal arrives or a supervised task fails, then
    /// shuts the router down.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }

            cancellation_token.cancel();
        });

        if self.config.server.enabled {
            let state = ApiState {
                config: Arc::clone(&self.config),
                router: Arc::clone(&self.router),
                store: Arc::clone(&self.store),
                api_key: Arc::clone(&self.api_key),
            };
            let token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                if let Err(e) = http_server::run_server_from_config(state, token.clone()).await {
                    tracing::error!(error = %e, "HTTP server failed. Initiating shutdown.");
                    token.cancel();
                }
            });
        }

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        self.join_set.shutdown().await;
        tracing::info!("All supervised tasks have completed.");

        let shutdown_timeout = self.config.shutdown_timeout;
        tracing::info!("Flushing pending notifications...");
        if tokio::time::timeout(shutdown_timeout, self.router.shutdown()).await.is_err() {
            tracing::warn!(
                "Router shutdown did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        } else {
            tracing::info!("Router shut down cleanly.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
