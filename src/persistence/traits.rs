//! The storage interface used by the router, the HTTP API and the supervisor.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::error::PersistenceError;

/// Durable state shared by every route.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Adds one to the delivered counter of `output_name`.
    async fn increment_delivery_count(&self, output_name: &str) -> Result<(), PersistenceError>;

    /// Returns the delivered counter of every output that delivered at least once.
    async fn get_delivery_counts(&self) -> Result<HashMap<String, u64>, PersistenceError>;

    /// Creates (or replaces) the API key of `tenant` and returns it.
    async fn generate_and_store_api_key(&self, tenant: &str) -> Result<String, PersistenceError>;

    /// Returns the API key of `tenant`, if one was generated.
    async fn get_api_key(&self, tenant: &str) -> Result<Option<String>, PersistenceError>;

    /// Records `fingerprint` for `ttl` and returns `true` when it was not
    /// already live. A zero `ttl` keeps the fingerprint forever.
    async fn register_fingerprint(
        &self,
        fingerprint: &str,
        ttl: Duration,
    ) -> Result<bool, PersistenceError>;
}
