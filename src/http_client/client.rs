//! Retrying middleware for output clients.

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{Jitter, RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{HttpRetryConfig, JitterSetting};

fn backoff_policy(config: &HttpRetryConfig) -> ExponentialBackoff {
    let jitter = match config.jitter {
        JitterSetting::None => Jitter::None,
        JitterSetting::Full => Jitter::Full,
    };
    ExponentialBackoff::builder()
        .jitter(jitter)
        .base(config.base_for_backoff)
        .retry_bounds(config.initial_backoff_ms, config.max_backoff_secs)
        .build_with_max_retries(config.max_retries)
}

/// Wraps `base_client` so transient failures (connect errors, 5xx, 429) are
/// retried with exponential backoff. With `max_retries == 0` no retry
/// middleware is installed.
pub fn create_retryable_http_client(
    config: &HttpRetryConfig,
    base_client: reqwest::Client,
) -> ClientWithMiddleware {
    let builder = ClientBuilder::new(base_client);
    if config.max_retries == 0 {
        return builder.build();
    }
    builder.with(RetryTransientMiddleware::new_with_policy(backoff_policy(config))).build()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn retry_config(max_retries: u32) -> HttpRetryConfig {
        HttpRetryConfig {
            max_retries,
            initial_backoff_ms: Duration::from_millis(1),
            max_backoff_secs: Duration::from_millis(5),
            jitter: JitterSetting::None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").with_status(503).expect(3).create_async().await;

        let client = create_retryable_http_client(&retry_config(2), reqwest::Client::new());
        let response = client.post(server.url()).send().await.unwrap();

        assert_eq!(response.status(), 503);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_zero_retries_sends_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").with_status(503).expect(1).create_async().await;

        let client = create_retryable_http_client(&retry_config(0), reqwest::Client::new());
        client.post(server.url()).send().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").with_status(400).expect(1).create_async().await;

        let client = create_retryable_http_client(&retry_config(3), reqwest::Client::new());
        client.post(server.url()).send().await.unwrap();

        mock.assert_async().await;
    }
}
