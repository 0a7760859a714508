//! Template definitions used to render events into output fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::{Loadable, LoaderError};

/// Name of the template used when a route does not pick one.
pub const DEFAULT_TEMPLATE_NAME: &str = "default";

/// How a template turns an event into fields.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// minijinja templates for title, description and url.
    #[default]
    Jinja,
    /// The raw event as description. Cannot aggregate.
    Json,
}

/// A single template from `templates.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TemplateConfig {
    /// The unique name of the template.
    pub name: String,

    /// Rendering strategy.
    #[serde(default)]
    pub kind: TemplateKind,

    /// Title template. Context: `event`, `route`, `server_url`.
    #[serde(default)]
    pub title: String,

    /// Description template. Context: `event`, `route`, `server_url`.
    #[serde(default)]
    pub description: String,

    /// Optional link back to the event's origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Title for aggregated deliveries. Context: `route`, `count`, `items`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_title: Option<String>,
}

impl TemplateConfig {
    /// The built-in template: event image or name as title, pretty JSON body.
    pub fn builtin() -> Self {
        Self {
            name: DEFAULT_TEMPLATE_NAME.to_string(),
            kind: TemplateKind::Jinja,
            title: "{{ route }}: {{ event.image | default(event.name | default('event')) }}"
                .to_string(),
            description: "{{ event | json_format }}".to_string(),
            url: Some(
                "{% if server_url and event.image %}{{ server_url }}/images/{{ event.image | urlencode }}{% endif %}"
                    .to_string(),
            ),
            aggregation_title: Some("{{ route }}: {{ count }} events".to_string()),
        }
    }
}

/// Validation errors for templates.
#[derive(Debug, Clone, Error)]
pub enum TemplateConfigError {
    /// A jinja template without a description renders nothing useful.
    #[error("Template '{0}' must define a description.")]
    EmptyDescription(String),
}

/// Errors that can occur while loading templates.
#[derive(Debug, Error)]
pub enum TemplateLoadError {
    /// An error occurred during the loading process.
    #[error("Failed to load template configuration: {0}")]
    Loader(#[from] LoaderError),

    /// An error occurred during validation.
    #[error("Invalid template configuration: {0}")]
    Validation(#[from] TemplateConfigError),
}

impl Loadable for TemplateConfig {
    type Error = TemplateLoadError;

    const KEY: &'static str = "templates";

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&mut self) -> Result<(), Self::Error> {
        if self.kind == TemplateKind::Jinja && self.description.trim().is_empty() {
            return Err(TemplateConfigError::EmptyDescription(self.name.clone()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_template_needs_no_description() {
        let mut template = TemplateConfig {
            name: "raw".into(),
            kind: TemplateKind::Json,
            title: String::new(),
            description: String::new(),
            url: None,
            aggregation_title: None,
        };
        assert!(template.validate().is_ok());

        template.kind = TemplateKind::Jinja;
        assert!(matches!(
            template.validate(),
            Err(TemplateLoadError::Validation(TemplateConfigError::EmptyDescription(_)))
        ));
    }

    #[test]
    fn test_builtin_template_is_named_default() {
        let template = TemplateConfig::builtin();
        assert_eq!(template.name, DEFAULT_TEMPLATE_NAME);
        assert!(template.aggregation_title.is_some());
    }
}
