//! Errors returned by delivery stores.

use thiserror::Error;

/// Errors that can occur while reading or writing delivery state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A query failed or returned data that could not be decoded.
    #[error("Delivery store operation failed: {0}")]
    OperationFailed(String),

    /// The schema could not be brought up to date.
    #[error("Delivery store migration failed: {0}")]
    MigrationError(String),

    /// The database URL or an argument was rejected before reaching the
    /// database.
    #[error("Invalid delivery store input: {0}")]
    InvalidInput(String),
}
