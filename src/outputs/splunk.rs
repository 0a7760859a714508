//! Splunk HTTP Event Collector output.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use url::Url;

use super::{error::OutputError, traits::Output};
use crate::{
    http_client::{ClientSettings, HttpClientPool},
    models::{
        notification::{RenderedFields, RenderedFieldsExt},
        output::{DEFAULT_SPLUNK_EVENT_LIMIT, SplunkConfig},
    },
};

const ENVELOPE_PREFIX: &str = r#"{"sourcetype":"_json","event":"#;
const ENVELOPE_SUFFIX: &str = "}";

/// Sends the rendered description, which must be JSON, as one HEC event.
pub struct SplunkOutput {
    name: String,
    endpoint: Url,
    auth: HeaderValue,
    event_limit: usize,
    truncation_order: Vec<String>,
    client: Arc<ClientWithMiddleware>,
}

impl SplunkOutput {
    /// Builds the output, taking its HTTP client from `pool`.
    pub async fn new(
        name: &str,
        config: &SplunkConfig,
        pool: &HttpClientPool,
    ) -> Result<Self, OutputError> {
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let endpoint = base
            .join("services/collector")
            .map_err(|e| OutputError::ConfigError(format!("Invalid Splunk URL: {e}")))?;
        let auth = HeaderValue::from_str(&format!("Splunk {}", config.token))
            .map_err(|e| OutputError::ConfigError(format!("Invalid Splunk token: {e}")))?;

        if config.event_limit < DEFAULT_SPLUNK_EVENT_LIMIT {
            tracing::warn!(
                output = name,
                event_limit = config.event_limit,
                default = DEFAULT_SPLUNK_EVENT_LIMIT,
                "Splunk output has a short event limit."
            );
        }

        let client = pool
            .get_or_create(&ClientSettings {
                retry: config.retry_policy.clone(),
                timeout: Some(Duration::from_secs(30)),
                accept_invalid_certs: config.tls_skip_verify,
            })
            .await?;

        Ok(Self {
            name: name.to_string(),
            endpoint,
            auth,
            event_limit: config.event_limit,
            truncation_order: config.truncation_order.clone(),
            client,
        })
    }

    /// Serializes the HEC envelope around `description`, dropping keys in
    /// truncation order until it fits the event limit.
    pub fn build_envelope(&self, description: &str) -> Result<String, OutputError> {
        let mut event: Value = serde_json::from_str(description)?;
        let overhead = ENVELOPE_PREFIX.len() + ENVELOPE_SUFFIX.len();
        let budget = self.event_limit.saturating_sub(overhead);

        let mut keys = self.truncation_order.iter();
        let body = loop {
            let raw = serde_json::to_string(&event)?;
            if raw.len() <= budget {
                break raw;
            }
            let Value::Object(map) = &mut event else {
                return Err(OutputError::PayloadTooLarge { size: raw.len(), limit: budget });
            };
            let next = keys.by_ref().find(|k| map.get(k.as_str()).is_some_and(|v| !is_empty(v)));
            match next {
                Some(key) => {
                    tracing::debug!(output = %self.name, key = %key, size = raw.len(), "Dropping key to fit Splunk event limit.");
                    map.remove(key.as_str());
                }
                None => return Err(OutputError::PayloadTooLarge { size: raw.len(), limit: budget }),
            }
        };

        Ok(format!("{ENVELOPE_PREFIX}{body}{ENVELOPE_SUFFIX}"))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl Output for SplunkOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "splunk"
    }

    async fn send(&self, fields: &RenderedFields) -> Result<(), OutputError> {
        let envelope = self.build_envelope(fields.description())?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, self.auth.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(output = %self.name, %status, body = %body, "Splunk rejected the event.");
            return Err(OutputError::NotifyFailed(format!("Splunk responded with status {status}")));
        }

        tracing::debug!(output = %self.name, "Event sent to Splunk.");
        Ok(())
    }
}
