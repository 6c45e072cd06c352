//! Storage error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row could not be mapped back to relay state.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<StorageError> for relay_core::RelayError {
    fn from(e: StorageError) -> Self {
        relay_core::RelayError::Storage(e.to_string())
    }
}
