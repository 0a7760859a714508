//! Routes as the router sees them: configuration resolved against outputs
//! and renderers, and the sources a route set is loaded from.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;

use super::{
    dispatch::{DispatchCoordinator, DispatchPayload},
    renderer::{Renderer, renderer_for},
    scheduler::FlushSink,
};
use crate::{
    config::AppConfig,
    http_client::HttpClientPool,
    loader::{load_config, load_optional_config},
    models::{
        notification::RenderedFields,
        output::{OutputConfig, OutputConfigError},
        route::{RouteConfig, RouteLoadError},
        template::{DEFAULT_TEMPLATE_NAME, TemplateConfig, TemplateLoadError},
    },
    outputs::{Output, build_outputs},
    template::TemplateService,
};

/// A route resolved against its renderer and outputs.
pub struct RouteContext {
    /// The route's configuration.
    pub config: RouteConfig,
    /// Renders events accepted by the route.
    pub renderer: Arc<dyn Renderer>,
    /// Outputs in configured order. Unknown names are already left out.
    pub outputs: Vec<Arc<dyn Output>>,
}

/// Everything a reload installs: routes plus the outputs and renderers they
/// reference by name.
#[derive(Clone, Default)]
pub struct RouteSet {
    /// Routes in configured order.
    pub routes: Vec<RouteConfig>,
    /// Built outputs by name.
    pub outputs: HashMap<String, Arc<dyn Output>>,
    /// Renderers by template name.
    pub renderers: HashMap<String, Arc<dyn Renderer>>,
}

/// Inconsistencies that make a route set unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteSetError {
    /// Two routes share a name.
    #[error("Duplicate route name '{0}'")]
    DuplicateRoute(String),

    /// A route references a template that does not exist.
    #[error("Route '{route}' references unknown template '{template}'")]
    UnknownTemplate {
        /// The route.
        route: String,
        /// The missing template.
        template: String,
    },
}

impl RouteSet {
    /// Checks that route names are unique and every template exists.
    pub fn validate(&self) -> Result<(), RouteSetError> {
        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.name.as_str()) {
                return Err(RouteSetError::DuplicateRoute(route.name.clone()));
            }
            self.renderer_for(route)?;
        }
        Ok(())
    }

    fn renderer_for(&self, route: &RouteConfig) -> Result<Arc<dyn Renderer>, RouteSetError> {
        let template = route.template.as_deref().unwrap_or(DEFAULT_TEMPLATE_NAME);
        self.renderers.get(template).cloned().ok_or_else(|| RouteSetError::UnknownTemplate {
            route: route.name.clone(),
            template: template.to_string(),
        })
    }

    /// Resolves `route` into a [`RouteContext`]. Outputs missing from the set
    /// are skipped with a warning.
    pub fn resolve(&self, route: &RouteConfig) -> Result<RouteContext, RouteSetError> {
        let renderer = self.renderer_for(route)?;
        let outputs = route
            .outputs
            .iter()
            .filter_map(|name| {
                let output = self.outputs.get(name).cloned();
                if output.is_none() {
                    tracing::warn!(route = %route.name, output = %name, "Route references an unknown or disabled output, skipping it.");
                }
                output
            })
            .collect::<Vec<_>>();
        if outputs.is_empty() {
            tracing::warn!(route = %route.name, "Route has no usable outputs.");
        }
        Ok(RouteContext { config: route.clone(), renderer, outputs })
    }
}

/// Errors raised while loading a route set.
#[derive(Debug, Error)]
pub enum RouteSourceError {
    /// Routes failed to load.
    #[error(transparent)]
    Routes(#[from] RouteLoadError),

    /// Outputs failed to load.
    #[error(transparent)]
    Outputs(#[from] OutputConfigError),

    /// Templates failed to load.
    #[error(transparent)]
    Templates(#[from] TemplateLoadError),
}

/// Where the router gets its routes from on every reload.
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Loads a fresh route set.
    async fn load(&self) -> Result<RouteSet, RouteSourceError>;
}

/// Loads routes, outputs and templates from the YAML files named in
/// [`AppConfig`].
pub struct FileRouteSource {
    routes_path: PathBuf,
    outputs_path: PathBuf,
    templates_path: PathBuf,
    pool: Arc<HttpClientPool>,
    templates: Arc<TemplateService>,
}

impl FileRouteSource {
    /// Creates a source reading the files configured in `config`.
    pub fn new(config: &AppConfig, pool: Arc<HttpClientPool>, templates: Arc<TemplateService>) -> Self {
        Self {
            routes_path: config.routes_config_path.clone(),
            outputs_path: config.outputs_config_path.clone(),
            templates_path: config.templates_config_path.clone(),
            pool,
            templates,
        }
    }
}

#[async_trait]
impl RouteSource for FileRouteSource {
    async fn load(&self) -> Result<RouteSet, RouteSourceError> {
        let routes = load_config::<RouteConfig>(self.routes_path.clone())?;
        let output_configs = load_config::<OutputConfig>(self.outputs_path.clone())?;
        let template_configs = load_optional_config::<TemplateConfig>(self.templates_path.clone())?;
        tracing::debug!(
            routes = routes.len(),
            outputs = output_configs.len(),
            templates = template_configs.len(),
            "Configuration files loaded."
        );

        let mut renderers: HashMap<String, Arc<dyn Renderer>> = template_configs
            .into_iter()
            .map(|t| (t.name.clone(), renderer_for(t, Arc::clone(&self.templates))))
            .collect();
        renderers
            .entry(DEFAULT_TEMPLATE_NAME.to_string())
            .or_insert_with(|| renderer_for(TemplateConfig::builtin(), Arc::clone(&self.templates)));

        let outputs = build_outputs(&output_configs, &self.pool).await;

        Ok(RouteSet { routes, outputs, renderers })
    }
}

/// A source holding an in-memory route set, replaced programmatically.
#[derive(Default)]
pub struct StaticRouteSource {
    set: ArcSwap<RouteSet>,
}

impl StaticRouteSource {
    /// Creates a source that serves `set` until replaced.
    pub fn new(set: RouteSet) -> Self {
        Self { set: ArcSwap::from_pointee(set) }
    }

    /// Replaces the set served by the next [`RouteSource::load`].
    pub fn replace(&self, set: RouteSet) {
        self.set.store(Arc::new(set));
    }
}

#[async_trait]
impl RouteSource for StaticRouteSource {
    async fn load(&self) -> Result<RouteSet, RouteSourceError> {
        Ok(self.set.load_full().as_ref().clone())
    }
}

/// Hands batches flushed by a route's scheduler to the dispatch coordinator,
/// using whatever context the route currently has.
pub struct RouteFlushSink {
    context: Arc<ArcSwap<RouteContext>>,
    coordinator: Arc<DispatchCoordinator>,
}

impl RouteFlushSink {
    /// Creates a sink for the route behind `context`.
    pub fn new(context: Arc<ArcSwap<RouteContext>>, coordinator: Arc<DispatchCoordinator>) -> Self {
        Self { context, coordinator }
    }
}

#[async_trait]
impl FlushSink for RouteFlushSink {
    async fn flush(&self, route: &str, items: Vec<RenderedFields>) {
        let context = self.context.load_full();
        match self.coordinator.dispatch(&context, DispatchPayload::Batch(items)).await {
            Ok(report) if !report.is_success() => {
                tracing::warn!(route = %route, failed = ?report.failed, "Batch delivery partially failed.");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(route = %route, error = %e, "Batch dispatch aborted."),
        }
    }
}
