use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    engine::{renderer::Renderer, route::RouteSet},
    models::{route::RouteConfig, template::DEFAULT_TEMPLATE_NAME},
    outputs::Output,
};

use super::FieldRenderer;

/// A builder for creating `RouteConfig` instances for testing.
pub struct RouteBuilder {
    config: RouteConfig,
}

impl RouteBuilder {
    /// Creates a route named `name` with no policy and no aggregation.
    pub fn new(name: &str) -> Self {
        Self { config: RouteConfig::new(name, Vec::new()) }
    }

    /// Sets the Rhai policy.
    pub fn policy(mut self, policy: &str) -> Self {
        self.config.policy = policy.to_string();
        self
    }

    /// Adds an output reference.
    pub fn output(mut self, name: &str) -> Self {
        self.config.outputs.push(name.to_string());
        self
    }

    /// Sets the count threshold.
    pub fn aggregate_count(mut self, count: usize) -> Self {
        self.config.aggregate_count = count;
        self
    }

    /// Sets the timer period.
    pub fn aggregate_timeout(mut self, timeout: Duration) -> Self {
        self.config.aggregate_timeout = timeout;
        self
    }

    /// Sets the template name.
    pub fn template(mut self, template: &str) -> Self {
        self.config.template = Some(template.to_string());
        self
    }

    /// Enables deduplication on the given event paths.
    pub fn unique_props(mut self, props: &[&str], timeout: Duration) -> Self {
        self.config.unique_message_props = props.iter().map(|p| p.to_string()).collect();
        self.config.unique_message_timeout = timeout;
        self
    }

    /// Builds the `RouteConfig`.
    pub fn build(self) -> RouteConfig {
        self.config
    }
}

/// Builds a route set whose default template is a [`FieldRenderer`] on `id`.
pub fn route_set(routes: Vec<RouteConfig>, outputs: Vec<Arc<dyn Output>>) -> RouteSet {
    let renderer: Arc<dyn Renderer> = Arc::new(FieldRenderer::new("id"));
    RouteSet {
        routes,
        outputs: outputs.into_iter().map(|o| (o.name().to_string(), o)).collect(),
        renderers: HashMap::from([(DEFAULT_TEMPLATE_NAME.to_string(), renderer)]),
    }
}
