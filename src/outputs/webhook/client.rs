//! HTTP delivery of JSON payloads with optional HMAC signing.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    Method,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use reqwest_middleware::ClientWithMiddleware;
use sha2::Sha256;
use url::Url;

use crate::outputs::error::OutputError;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Longest response body quoted in an error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Connection details of one webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint URL.
    pub url: Url,
    /// HTTP method; POST when unset.
    pub method: Option<String>,
    /// Secret used to sign the body.
    pub secret: Option<String>,
    /// Extra headers sent with every request.
    pub headers: Option<HashMap<String, String>>,
}

/// Sends JSON payloads to one webhook endpoint.
#[derive(Debug)]
pub struct WebhookClient {
    url: Url,
    client: Arc<ClientWithMiddleware>,
    method: Method,
    secret: Option<String>,
    headers: HeaderMap,
}

impl WebhookClient {
    /// Creates a client, validating method and headers up front.
    pub fn new(
        config: WebhookConfig,
        http_client: Arc<ClientWithMiddleware>,
    ) -> Result<Self, OutputError> {
        let method = match &config.method {
            Some(m) => Method::from_bytes(m.to_uppercase().as_bytes())
                .map_err(|e| OutputError::ConfigError(format!("Invalid HTTP method {m}: {e}")))?,
            None => Method::POST,
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in config.headers.iter().flatten() {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                OutputError::ConfigError(format!("Invalid header name: {key}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                OutputError::ConfigError(format!("Invalid header value for {key}: {e}"))
            })?;
            headers.insert(name, value);
        }

        if config.secret.as_deref() == Some("") {
            return Err(OutputError::ConfigError("Invalid secret: cannot be empty.".to_string()));
        }

        Ok(Self { url: config.url, client: http_client, method, secret: config.secret, headers })
    }

    /// Signs `body` followed by the current millisecond timestamp.
    ///
    /// Returns the hex signature and the timestamp that was signed.
    pub fn sign_payload(secret: &str, body: &[u8]) -> Result<(String, String), OutputError> {
        let timestamp = Utc::now().timestamp_millis().to_string();

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| OutputError::ConfigError(format!("Invalid secret: {e}")))?;
        mac.update(body);
        mac.update(timestamp.as_bytes());

        Ok((hex::encode(mac.finalize().into_bytes()), timestamp))
    }

    /// Sends a JSON payload to the endpoint.
    pub async fn send_json(&self, payload: &serde_json::Value) -> Result<(), OutputError> {
        let body = serde_json::to_vec(payload)?;
        let mut headers = self.headers.clone();

        if let Some(secret) = &self.secret {
            let (signature, timestamp) = Self::sign_payload(secret, &body)?;
            headers.insert(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).map_err(|e| {
                    OutputError::NotifyFailed(format!("Invalid signature value: {e}"))
                })?,
            );
            headers.insert(
                HeaderName::from_static("x-timestamp"),
                HeaderValue::from_str(&timestamp).map_err(|e| {
                    OutputError::NotifyFailed(format!("Invalid timestamp value: {e}"))
                })?,
            );
        }

        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(OutputError::NotifyFailed(format!(
                "Webhook request failed with status {status}: {text}"
            )));
        }

        Ok(())
    }
}
