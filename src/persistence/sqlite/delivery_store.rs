use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use sqlx::Row;

use super::SqliteDeliveryStore;
use crate::persistence::{error::PersistenceError, traits::DeliveryStore};

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl DeliveryStore for SqliteDeliveryStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn increment_delivery_count(&self, output_name: &str) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "increment delivery count",
            sqlx::query(
                "INSERT INTO delivery_stats (output_name, delivered) VALUES (?, 1)
                 ON CONFLICT(output_name) DO UPDATE SET
                     delivered = delivered + 1,
                     updated_at = CURRENT_TIMESTAMP",
            )
            .bind(output_name)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_delivery_counts(&self) -> Result<HashMap<String, u64>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "query delivery counts",
                sqlx::query("SELECT output_name, delivered FROM delivery_stats")
                    .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                let name: String = row.get("output_name");
                let delivered: i64 = row.get("delivered");
                let delivered = u64::try_from(delivered)
                    .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
                Ok((name, delivered))
            })
            .collect()
    }

    #[tracing::instrument(skip(self), level = "info")]
    async fn generate_and_store_api_key(&self, tenant: &str) -> Result<String, PersistenceError> {
        let api_key = hex::encode(rand::random::<[u8; 32]>());

        self.execute_query_with_error_handling(
            "store api key",
            sqlx::query(
                "INSERT INTO api_keys (tenant, api_key) VALUES (?, ?)
                 ON CONFLICT(tenant) DO UPDATE SET
                     api_key = excluded.api_key,
                     created_at = CURRENT_TIMESTAMP",
            )
            .bind(tenant)
            .bind(&api_key)
            .execute(&self.pool),
        )
        .await?;

        tracing::info!(tenant, "API key generated.");
        Ok(api_key)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_api_key(&self, tenant: &str) -> Result<Option<String>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "query api key",
                sqlx::query("SELECT api_key FROM api_keys WHERE tenant = ?")
                    .bind(tenant)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|r| r.get("api_key")))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn register_fingerprint(
        &self,
        fingerprint: &str,
        ttl: Duration,
    ) -> Result<bool, PersistenceError> {
        let now = now_unix();
        let expires_at = if ttl.is_zero() {
            i64::MAX
        } else {
            let secs = i64::try_from(ttl.as_secs())
                .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?;
            now.saturating_add(secs.max(1))
        };

        self.execute_query_with_error_handling(
            "purge expired fingerprints",
            sqlx::query("DELETE FROM message_fingerprints WHERE expires_at <= ?")
                .bind(now)
                .execute(&self.pool),
        )
        .await?;

        let result = self
            .execute_query_with_error_handling(
                "insert fingerprint",
                sqlx::query(
                    "INSERT OR IGNORE INTO message_fingerprints (fingerprint, expires_at) VALUES (?, ?)",
                )
                .bind(fingerprint)
                .bind(expires_at)
                .execute(&self.pool),
            )
            .await?;

        let is_new = result.rows_affected() == 1;
        tracing::debug!(fingerprint, is_new, "Fingerprint registered.");
        Ok(is_new)
    }
}
