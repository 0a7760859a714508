use async_trait::async_trait;

use super::{error::OutputError, traits::Output};
use crate::models::{
    notification::{RenderedFields, RenderedFieldsExt},
    output::StdoutConfig,
};

/// An output that prints deliveries to standard output.
pub struct StdoutOutput {
    name: String,
    config: StdoutConfig,
}

impl StdoutOutput {
    /// Creates the output.
    pub fn new(name: &str, config: StdoutConfig) -> Self {
        Self { name: name.to_string(), config }
    }

    fn format(&self, fields: &RenderedFields) -> Result<String, OutputError> {
        if self.config.json {
            return Ok(serde_json::to_string(fields)?);
        }
        let mut text = format!("=== {} ===\n{}\n{}\n", self.name, fields.title(), fields.description());
        if let Some(url) = fields.url() {
            text.push_str(url);
            text.push('\n');
        }
        Ok(text)
    }
}

#[async_trait]
impl Output for StdoutOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, fields: &RenderedFields) -> Result<(), OutputError> {
        println!("{}", self.format(fields)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::rendered;

    #[test]
    fn test_text_format() {
        let output = StdoutOutput::new("console", StdoutConfig::default());
        let text = output.format(&rendered("Title", "Body", Some("https://x"))).unwrap();
        assert_eq!(text, "=== console ===\nTitle\nBody\nhttps://x\n");
    }

    #[test]
    fn test_json_format() {
        let output = StdoutOutput::new("console", StdoutConfig { json: true });
        let text = output.format(&rendered("Title", "Body", None)).unwrap();
        assert_eq!(text, r#"{"description":"Body","title":"Title"}"#);
    }
}
