use std::time::Duration;

use url::Url;

use crate::{
    config::HttpRetryConfig,
    models::output::{GenericWebhookConfig, OutputConfig, OutputTypeConfig, StdoutConfig},
};

/// A builder for creating `OutputConfig` instances for testing.
pub struct OutputBuilder {
    name: String,
    enable: bool,
    config: OutputTypeConfig,
}

impl OutputBuilder {
    /// Creates a new `OutputBuilder` for a text stdout output.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enable: true,
            config: OutputTypeConfig::Stdout(StdoutConfig::default()),
        }
    }

    /// Sets the output to a generic webhook without retries.
    pub fn webhook_config(mut self, url: &str) -> Self {
        self.config = OutputTypeConfig::Webhook(GenericWebhookConfig {
            url: Url::parse(url).unwrap(),
            method: None,
            secret: None,
            headers: None,
            timeout: Duration::from_secs(5),
            retry_policy: no_retries(),
        });
        self
    }

    /// Disables the output.
    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }

    /// Builds the `OutputConfig`.
    pub fn build(self) -> OutputConfig {
        OutputConfig { name: self.name, enable: self.enable, config: self.config }
    }
}

fn no_retries() -> HttpRetryConfig {
    HttpRetryConfig { max_retries: 0, ..Default::default() }
}
