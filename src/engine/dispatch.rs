//! Delivery of rendered content to every output of a route.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

use super::{renderer::RenderError, route::RouteContext};
use crate::{
    models::notification::RenderedFields,
    outputs::Output,
    persistence::traits::DeliveryStore,
};

/// What a dispatch delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPayload {
    /// One rendered event, delivered as is.
    Single(RenderedFields),
    /// A flushed buffer, combined into one delivery when the renderer can.
    Batch(Vec<RenderedFields>),
}

/// Per-output outcome of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Names of the outputs that accepted a delivery, once per delivery.
    pub delivered: Vec<String>,
    /// Outputs that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// True when no output failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge(&mut self, other: DispatchReport) {
        self.delivered.extend(other.delivered);
        self.failed.extend(other.failed);
    }
}

/// Errors that abort a dispatch before any output is called.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The batch could not be rendered; nothing was sent.
    #[error("Failed to render batch for route '{route}': {source}")]
    Render {
        /// The route whose batch failed.
        route: String,
        /// The renderer's error.
        #[source]
        source: RenderError,
    },
}

/// Fans rendered content out to a route's outputs and keeps delivery counts.
pub struct DispatchCoordinator {
    store: Arc<dyn DeliveryStore>,
}

impl DispatchCoordinator {
    /// Creates a coordinator recording statistics in `store`.
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Delivers `payload` to every output of `route`.
    ///
    /// Output failures are reported, never returned as errors. A batch the
    /// renderer cannot combine is delivered item by item in arrival order.
    pub async fn dispatch(
        &self,
        route: &RouteContext,
        payload: DispatchPayload,
    ) -> Result<DispatchReport, DispatchError> {
        let route_name = route.config.name.as_str();
        match payload {
            DispatchPayload::Single(fields) => Ok(self.deliver(route, &fields).await),
            DispatchPayload::Batch(items) if items.is_empty() => Ok(DispatchReport::default()),
            DispatchPayload::Batch(items) if route.renderer.supports_aggregation() => {
                let fields = route.renderer.render_batch(route_name, &items).map_err(|source| {
                    tracing::error!(route = %route_name, size = items.len(), error = %source, "Failed to render batch, dropping it.");
                    DispatchError::Render { route: route_name.to_string(), source }
                })?;
                tracing::debug!(route = %route_name, size = items.len(), "Dispatching aggregated batch.");
                Ok(self.deliver(route, &fields).await)
            }
            DispatchPayload::Batch(items) => {
                tracing::debug!(route = %route_name, size = items.len(), "Renderer cannot aggregate, dispatching items individually.");
                let mut report = DispatchReport::default();
                for item in &items {
                    report.merge(self.deliver(route, item).await);
                }
                Ok(report)
            }
        }
    }

    async fn deliver(&self, route: &RouteContext, fields: &RenderedFields) -> DispatchReport {
        let sends = route.outputs.iter().map(|output| self.send_one(&route.config.name, output, fields));
        let mut report = DispatchReport::default();
        for (name, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(name),
                Err(e) => report.failed.push((name, e)),
            }
        }
        report
    }

    async fn send_one(
        &self,
        route: &str,
        output: &Arc<dyn Output>,
        fields: &RenderedFields,
    ) -> (String, Result<(), String>) {
        let name = output.name().to_string();
        match output.send(fields).await {
            Ok(()) => {
                tracing::info!(route = %route, output = %name, kind = output.kind(), "Notification delivered.");
                if let Err(e) = self.store.increment_delivery_count(&name).await {
                    tracing::warn!(output = %name, error = %e, "Failed to update delivery count.");
                }
                (name, Ok(()))
            }
            Err(e) => {
                tracing::error!(route = %route, output = %name, kind = output.kind(), error = %e, "Notification delivery failed.");
                (name, Err(e.to_string()))
            }
        }
    }
}
