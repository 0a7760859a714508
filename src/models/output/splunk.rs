use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::HttpRetryConfig;

/// Default maximum size of one HEC event in bytes.
pub const DEFAULT_SPLUNK_EVENT_LIMIT: usize = 10_000;

fn default_event_limit() -> usize {
    DEFAULT_SPLUNK_EVENT_LIMIT
}

fn default_truncation_order() -> Vec<String> {
    vec!["resources".to_string(), "malwares".to_string(), "sensitive_data".to_string()]
}

/// Configuration for a Splunk HTTP Event Collector output.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SplunkConfig {
    /// Base URL of the Splunk instance; `services/collector` is appended.
    pub url: Url,
    /// HEC token.
    pub token: String,
    /// Maximum size of the serialized HEC event in bytes.
    #[serde(default = "default_event_limit")]
    pub event_limit: usize,
    /// Top-level event keys dropped, in order, until the event fits.
    #[serde(default = "default_truncation_order")]
    pub truncation_order: Vec<String>,
    /// Accept self-signed certificates.
    #[serde(default)]
    pub tls_skip_verify: bool,
    /// The retry policy configuration for HTTP requests.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}
