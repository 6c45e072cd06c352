//! Storage crate: SQLite persistence for relay state.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – UserRow, BindingRow, PersistedStats
//! - [`snapshot_repo`] – SnapshotRepository (load/save hooks)
//! - [`sqlite_pool`] – SqlitePoolManager

mod error;
mod models;
mod snapshot_repo;
mod sqlite_pool;


pub use error::StorageError;
pub use models::{BindingRow, PersistedStats, UserRow};
pub use snapshot_repo::SnapshotRepository;
pub use sqlite_pool::SqlitePoolManager;
