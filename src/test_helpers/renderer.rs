use serde_json::Value;

use crate::{
    engine::renderer::{RenderError, Renderer},
    models::{
        event::Event,
        notification::{RenderedFields, RenderedFieldsExt, rendered},
    },
};

/// A renderer that titles each event with one of its fields, so tests can
/// follow individual events through batches.
pub struct FieldRenderer {
    field: String,
    aggregation: bool,
}

impl FieldRenderer {
    /// Titles events with the value of `field`. Batches are titled with the
    /// item titles joined by commas.
    pub fn new(field: &str) -> Self {
        Self { field: field.to_string(), aggregation: true }
    }

    /// Makes the renderer report that it cannot aggregate.
    pub fn without_aggregation(mut self) -> Self {
        self.aggregation = false;
        self
    }
}

impl Renderer for FieldRenderer {
    fn render_single(
        &self,
        route: &str,
        event: &Event,
        server_url: &str,
    ) -> Result<RenderedFields, RenderError> {
        let title = match event.get_path(&self.field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => route.to_string(),
        };
        let url = (!server_url.is_empty()).then_some(server_url);
        Ok(rendered(&title, &String::from_utf8_lossy(event.raw()), url))
    }

    fn render_batch(
        &self,
        route: &str,
        items: &[RenderedFields],
    ) -> Result<RenderedFields, RenderError> {
        if !self.aggregation {
            return Err(RenderError::AggregationUnsupported(route.to_string()));
        }
        let titles: Vec<_> = items.iter().map(|i| i.title()).collect();
        Ok(rendered(&titles.join(","), "", None))
    }

    fn supports_aggregation(&self) -> bool {
        self.aggregation
    }
}
