//! Turning events and batches into output-ready fields.

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use serde_json::json;
use thiserror::Error;

use crate::{
    models::{
        event::Event,
        notification::{DESCRIPTION_KEY, RenderedFields, RenderedFieldsExt, TITLE_KEY, URL_KEY},
        template::{TemplateConfig, TemplateKind},
    },
    template::{TemplateService, TemplateServiceError},
};

/// Title used for batches when a template has no `aggregation_title`.
const DEFAULT_AGGREGATION_TITLE: &str = "{{ route }}: {{ count }} events";

/// Errors produced while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A template failed to render.
    #[error(transparent)]
    Template(#[from] TemplateServiceError),

    /// The renderer cannot combine items into one delivery.
    #[error("Renderer '{0}' does not support aggregation")]
    AggregationUnsupported(String),
}

/// Produces output fields for single events and batches.
#[cfg_attr(test, automock)]
pub trait Renderer: Send + Sync {
    /// Renders one event accepted by `route`.
    fn render_single(
        &self,
        route: &str,
        event: &Event,
        server_url: &str,
    ) -> Result<RenderedFields, RenderError>;

    /// Combines already rendered items of `route` into one delivery.
    fn render_batch(
        &self,
        route: &str,
        items: &[RenderedFields],
    ) -> Result<RenderedFields, RenderError>;

    /// Whether [`Renderer::render_batch`] is available.
    fn supports_aggregation(&self) -> bool;
}

/// Builds the renderer described by a template.
pub fn renderer_for(template: TemplateConfig, service: Arc<TemplateService>) -> Arc<dyn Renderer> {
    match template.kind {
        TemplateKind::Jinja => Arc::new(TemplateRenderer::new(template, service)),
        TemplateKind::Json => Arc::new(JsonRenderer { name: template.name }),
    }
}

/// Renders with minijinja templates.
pub struct TemplateRenderer {
    template: TemplateConfig,
    service: Arc<TemplateService>,
}

impl TemplateRenderer {
    /// Creates a renderer for `template`.
    pub fn new(template: TemplateConfig, service: Arc<TemplateService>) -> Self {
        Self { template, service }
    }
}

impl Renderer for TemplateRenderer {
    fn render_single(
        &self,
        route: &str,
        event: &Event,
        server_url: &str,
    ) -> Result<RenderedFields, RenderError> {
        let context = json!({ "event": event.to_value(), "route": route, "server_url": server_url });

        let mut fields = RenderedFields::new();
        fields.insert(TITLE_KEY.into(), self.service.render(&self.template.title, context.clone())?);
        fields.insert(
            DESCRIPTION_KEY.into(),
            self.service.render(&self.template.description, context.clone())?,
        );
        if let Some(url) = &self.template.url {
            let url = self.service.render(url, context)?;
            if !url.trim().is_empty() {
                fields.insert(URL_KEY.into(), url.trim().to_string());
            }
        }
        Ok(fields)
    }

    fn render_batch(
        &self,
        route: &str,
        items: &[RenderedFields],
    ) -> Result<RenderedFields, RenderError> {
        let title_template =
            self.template.aggregation_title.as_deref().unwrap_or(DEFAULT_AGGREGATION_TITLE);
        let context = json!({ "route": route, "count": items.len(), "items": items });

        let description =
            items.iter().map(|i| i.description()).collect::<Vec<_>>().join("\n\n");
        let urls = items.iter().filter_map(|i| i.url()).collect::<Vec<_>>().join("\n");

        let mut fields = RenderedFields::new();
        fields.insert(TITLE_KEY.into(), self.service.render(title_template, context)?);
        fields.insert(DESCRIPTION_KEY.into(), description);
        if !urls.is_empty() {
            fields.insert(URL_KEY.into(), urls);
        }
        Ok(fields)
    }

    fn supports_aggregation(&self) -> bool {
        true
    }
}

/// Passes the raw event through as the description.
pub struct JsonRenderer {
    name: String,
}

impl Renderer for JsonRenderer {
    fn render_single(
        &self,
        route: &str,
        event: &Event,
        _server_url: &str,
    ) -> Result<RenderedFields, RenderError> {
        let mut fields = RenderedFields::new();
        fields.insert(TITLE_KEY.into(), route.to_string());
        fields.insert(DESCRIPTION_KEY.into(), String::from_utf8_lossy(event.raw()).into_owned());
        Ok(fields)
    }

    fn render_batch(
        &self,
        _route: &str,
        _items: &[RenderedFields],
    ) -> Result<RenderedFields, RenderError> {
        Err(RenderError::AggregationUnsupported(self.name.clone()))
    }

    fn supports_aggregation(&self) -> bool {
        false
    }
}
