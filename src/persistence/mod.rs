//! Durable state: delivery counters, tenant API keys and dedup fingerprints.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteDeliveryStore;
