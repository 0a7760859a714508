use std::sync::Arc;

use async_trait::async_trait;

use super::{WebhookClient, WebhookComponents, WebhookPayloadBuilder};
use crate::{
    http_client::HttpClientPool,
    models::notification::RenderedFields,
    outputs::{error::OutputError, traits::Output},
};

/// An output that delivers over a webhook (generic, Slack, Discord,
/// Telegram or Teams).
pub struct WebhookOutput {
    name: String,
    kind: &'static str,
    client: WebhookClient,
    builder: Box<dyn WebhookPayloadBuilder>,
}

impl WebhookOutput {
    /// Builds the output, taking its HTTP client from `pool`.
    pub async fn new(
        name: &str,
        kind: &'static str,
        components: WebhookComponents,
        pool: &HttpClientPool,
    ) -> Result<Self, OutputError> {
        let http_client = pool.get_or_create(&components.client_settings).await?;
        let client = WebhookClient::new(components.config, Arc::clone(&http_client))?;
        Ok(Self { name: name.to_string(), kind, client, builder: components.builder })
    }
}

#[async_trait]
impl Output for WebhookOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn send(&self, fields: &RenderedFields) -> Result<(), OutputError> {
        let payload = self.builder.build_payload(fields);
        self.client.send_json(&payload).await?;
        tracing::debug!(output = %self.name, kind = self.kind, "Webhook delivery succeeded.");
        Ok(())
    }
}
