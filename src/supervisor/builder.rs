//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    engine::{
        Router, RouterSettings,
        policy::{PolicyGate, RhaiPolicyGate},
        route::{FileRouteSource, RouteSource},
    },
    http_client::HttpClientPool,
    http_server::ensure_api_key,
    persistence::traits::DeliveryStore,
    template::TemplateService,
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    store: Option<Arc<dyn DeliveryStore>>,
    route_source: Option<Arc<dyn RouteSource>>,
    policy_gate: Option<Arc<dyn PolicyGate>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the delivery store for the `Supervisor`.
    pub fn store(mut self, store: Arc<dyn DeliveryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the YAML files as the source of routes.
    pub fn route_source(mut self, source: Arc<dyn RouteSource>) -> Self {
        self.route_source = Some(source);
        self
    }

    /// Replaces the Rhai policy gate.
    pub fn policy_gate(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.policy_gate = Some(gate);
        self
    }

    /// Wires the router, loads the initial routes and prepares the API key.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let store = self.store.ok_or(SupervisorError::MissingStore)?;

        let source = self.route_source.unwrap_or_else(|| {
            Arc::new(FileRouteSource::new(
                &config,
                Arc::new(HttpClientPool::new()),
                Arc::new(TemplateService::new()),
            ))
        });
        let policy_gate = self
            .policy_gate
            .unwrap_or_else(|| Arc::new(RhaiPolicyGate::new(config.rhai.clone())));

        let router = Arc::new(Router::new(
            source,
            policy_gate,
            Arc::clone(&store),
            RouterSettings::from(&config),
        ));
        router.reload_config().await?;
        tracing::info!(routes = ?router.route_names(), "Initial routes loaded.");

        let api_key = ensure_api_key(store.as_ref(), &config.tenant_name).await?;

        Ok(Supervisor::new(config, store, router, api_key))
    }
}
