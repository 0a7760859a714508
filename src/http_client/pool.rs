//! A reusable, thread-safe pool for managing HTTP clients.
//!
//! Every HTTP-based output asks the pool for a client matching its retry
//! policy, request timeout and TLS settings; outputs that agree on all three
//! share one connection pool.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::HttpRetryConfig;

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Everything that distinguishes one pooled client from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClientSettings {
    /// Retry policy applied by the middleware.
    pub retry: HttpRetryConfig,
    /// Per-request timeout; `None` leaves reqwest's default.
    pub timeout: Option<Duration>,
    /// Accept invalid TLS certificates (self-hosted Splunk and similar).
    pub accept_invalid_certs: bool,
}

impl ClientSettings {
    /// Settings with only a retry policy.
    pub fn with_retry(retry: &HttpRetryConfig) -> Self {
        Self { retry: retry.clone(), ..Default::default() }
    }
}

/// A pool for managing and reusing HTTP clients for outputs.
pub struct HttpClientPool {
    clients: Arc<RwLock<HashMap<ClientSettings, Arc<ClientWithMiddleware>>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool`.
    pub fn new() -> Self {
        Self { clients: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Gets an existing HTTP client from the pool or creates a new one.
    ///
    /// Uses double-checked locking so the common path only takes a read lock.
    pub async fn get_or_create(
        &self,
        settings: &ClientSettings,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        if let Some(client) = self.clients.read().await.get(settings) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(settings) {
            return Ok(client.clone());
        }

        let mut builder = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(settings.accept_invalid_certs);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let base_client =
            builder.build().map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(&settings.retry, base_client));
        clients.insert(settings.clone(), new_client.clone());

        Ok(new_client)
    }

    /// Returns the number of active HTTP clients in the pool.
    #[cfg(test)]
    pub async fn get_active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_init_empty() {
        let pool = HttpClientPool::new();
        assert_eq!(pool.get_active_client_count().await, 0);
    }

    #[tokio::test]
    async fn test_pool_returns_same_client() {
        let pool = HttpClientPool::new();
        let settings = ClientSettings::default();
        let client1 = pool.get_or_create(&settings).await.unwrap();
        let client2 = pool.get_or_create(&settings).await.unwrap();

        assert!(Arc::ptr_eq(&client1, &client2), "Should return the same client instance");
        assert_eq!(pool.get_active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_concurrent_access() {
        let pool = Arc::new(HttpClientPool::new());

        let tasks = (0..10).map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get_or_create(&ClientSettings::default()).await })
        });

        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(pool.get_active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_keys_on_every_setting() {
        let pool = HttpClientPool::new();

        let base = ClientSettings::default();
        let more_retries = ClientSettings::with_retry(&HttpRetryConfig {
            max_retries: 5,
            ..Default::default()
        });
        let short_timeout =
            ClientSettings { timeout: Some(Duration::from_secs(2)), ..Default::default() };
        let insecure = ClientSettings { accept_invalid_certs: true, ..Default::default() };

        let first = pool.get_or_create(&base).await.unwrap();
        for settings in [&more_retries, &short_timeout, &insecure] {
            let other = pool.get_or_create(settings).await.unwrap();
            assert!(!Arc::ptr_eq(&first, &other));
        }
        assert_eq!(pool.get_active_client_count().await, 4);

        let again = pool.get_or_create(&base).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
}
