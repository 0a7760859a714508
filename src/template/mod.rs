//! This module provides a service for rendering templates using the minijinja
//! templating engine.

mod filters;

use minijinja::{Environment, UndefinedBehavior};
use thiserror::Error;

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// The template failed to parse or evaluate.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

impl TemplateService {
    /// Creates a new instance of `TemplateService`.
    ///
    /// Undefined values render as empty so templates can probe optional event
    /// fields with `default` and `if`.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.add_filter("json_format", filters::json_format);
        env.add_filter("sum", filters::sum);
        env.add_filter("truncate_chars", filters::truncate_chars);

        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        tracing::trace!(template = template_str, "Rendering template.");

        match self.env.render_str(template_str, context) {
            Ok(rendered_string) => Ok(rendered_string),
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}", template_str, e);
                Err(TemplateServiceError::RenderError(e))
            }
        }
    }
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_template_with_context() {
        let service = TemplateService::new();
        let template = "{{ route }}: {{ event.image }} has {{ event.summary.critical }} critical";
        let context = json!({
            "route": "scans",
            "event": { "image": "alpine:3.19", "summary": { "critical": 2 } }
        });
        let result = service.render(template, context).unwrap();
        assert_eq!(result, "scans: alpine:3.19 has 2 critical");
    }

    #[test]
    fn test_missing_fields_fall_back_to_default() {
        let service = TemplateService::new();
        let template = "{{ event.image | default(event.name | default('event')) }}";

        let named = service.render(template, json!({ "event": { "name": "login" } })).unwrap();
        assert_eq!(named, "login");

        let empty = service.render(template, json!({ "event": {} })).unwrap();
        assert_eq!(empty, "event");
    }

    #[test]
    fn test_render_template_with_invalid_template() {
        let service = TemplateService::new();
        let result = service.render("Hello, {{ name }", json!({ "name": "World" }));
        assert!(matches!(result, Err(TemplateServiceError::RenderError(_))));
    }

    #[test]
    fn test_custom_filters_are_registered() {
        let service = TemplateService::new();
        let context = json!({ "event": { "a": 1 }, "scores": [1, 2.5, 3] });

        assert_eq!(service.render("{{ event | json_format }}", context.clone()).unwrap(), "{\n \"a\": 1\n}");
        assert_eq!(service.render("{{ scores | sum }}", context.clone()).unwrap(), "6.5");
        assert_eq!(service.render("{{ 'abcdef' | truncate_chars(3) }}", context).unwrap(), "abc…");
    }
}
