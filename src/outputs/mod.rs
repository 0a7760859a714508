//! Delivery targets and the registry that builds them from configuration.

use std::{collections::HashMap, sync::Arc};

use crate::{
    http_client::HttpClientPool,
    models::output::{OutputConfig, OutputTypeConfig},
};

pub mod error;
mod exec;
mod splunk;
mod stdout;
mod traits;
pub mod webhook;

pub use error::OutputError;
pub use exec::{EVENT_ENV_VAR, ExecOutput};
pub use splunk::SplunkOutput;
pub use stdout::StdoutOutput;
pub use traits::Output;
use webhook::{WebhookComponents, WebhookOutput};

/// Builds the output described by `config`.
pub async fn build_output(
    config: &OutputConfig,
    pool: &HttpClientPool,
) -> Result<Arc<dyn Output>, OutputError> {
    let name = config.name.as_str();
    let kind = config.config.kind();
    let output: Arc<dyn Output> = match &config.config {
        OutputTypeConfig::Webhook(c) => Arc::new(WebhookOutput::new(name, kind, c.into(), pool).await?),
        OutputTypeConfig::Slack(c) => Arc::new(WebhookOutput::new(name, kind, c.into(), pool).await?),
        OutputTypeConfig::Discord(c) => Arc::new(WebhookOutput::new(name, kind, c.into(), pool).await?),
        OutputTypeConfig::Teams(c) => Arc::new(WebhookOutput::new(name, kind, c.into(), pool).await?),
        OutputTypeConfig::Telegram(c) => {
            Arc::new(WebhookOutput::new(name, kind, WebhookComponents::try_from(c)?, pool).await?)
        }
        OutputTypeConfig::Splunk(c) => Arc::new(SplunkOutput::new(name, c, pool).await?),
        OutputTypeConfig::Exec(c) => Arc::new(ExecOutput::new(name, c.clone())),
        OutputTypeConfig::Stdout(c) => Arc::new(StdoutOutput::new(name, c.clone())),
    };
    Ok(output)
}

/// Builds every enabled output. An output that fails to build is logged and
/// left out so the remaining outputs still work.
pub async fn build_outputs(
    configs: &[OutputConfig],
    pool: &HttpClientPool,
) -> HashMap<String, Arc<dyn Output>> {
    let mut outputs = HashMap::new();
    for config in configs {
        if !config.enable {
            tracing::info!(output = %config.name, "Output is disabled, skipping.");
            continue;
        }
        match build_output(config, pool).await {
            Ok(output) => {
                tracing::debug!(output = %config.name, kind = output.kind(), "Output built.");
                outputs.insert(config.name.clone(), output);
            }
            Err(e) => {
                tracing::error!(output = %config.name, error = %e, "Failed to build output.");
            }
        }
    }
    outputs
}
