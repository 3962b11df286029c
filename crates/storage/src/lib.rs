//! Storage Layer
//!
//! Provides the latest-position / reference-data cache and partial-column
//! persistence for device entities, with in-memory implementations.

mod cache;
mod repository;

pub use cache::{MemoryCache, ObjectCache};
pub use repository::{DevicePersistence, DeviceRepository};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found: {0}")]
    NotFound(i64),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}
