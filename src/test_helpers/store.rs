use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::persistence::{
    SqliteDeliveryStore, error::PersistenceError, traits::DeliveryStore,
};

/// Creates a migrated in-memory SQLite delivery store.
pub async fn create_test_store() -> Arc<SqliteDeliveryStore> {
    let store = SqliteDeliveryStore::new("sqlite::memory:").await.unwrap();
    store.run_migrations().await.unwrap();
    Arc::new(store)
}

/// A delivery store kept in process memory. Fingerprints never expire.
///
/// Unlike SQLite it never leaves the runtime, so it works under paused time.
#[derive(Default)]
pub struct InMemoryDeliveryStore {
    counts: DashMap<String, u64>,
    keys: DashMap<String, String>,
    fingerprints: DashMap<String, ()>,
}

impl InMemoryDeliveryStore {
    /// Creates an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl DeliveryStore for InMemoryDeliveryStore {
    async fn increment_delivery_count(&self, output_name: &str) -> Result<(), PersistenceError> {
        *self.counts.entry(output_name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn get_delivery_counts(&self) -> Result<HashMap<String, u64>, PersistenceError> {
        Ok(self.counts.iter().map(|e| (e.key().clone(), *e.value())).collect())
    }

    async fn generate_and_store_api_key(&self, tenant: &str) -> Result<String, PersistenceError> {
        let key = format!("test-key-{tenant}");
        self.keys.insert(tenant.to_string(), key.clone());
        Ok(key)
    }

    async fn get_api_key(&self, tenant: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.keys.get(tenant).map(|k| k.clone()))
    }

    async fn register_fingerprint(
        &self,
        fingerprint: &str,
        _ttl: Duration,
    ) -> Result<bool, PersistenceError> {
        Ok(self.fingerprints.insert(fingerprint.to_string(), ()).is_none())
    }
}
