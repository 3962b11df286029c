//! Storage backends for encoded facets

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

use crate::StateError;

/// Byte-oriented key-value backing
///
/// Implemented in memory here; an external cache client implements the
/// same trait to share state across processes.
pub trait StateBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StateError>;
    fn remove(&self, key: &str) -> Result<(), StateError>;
}

/// Process-local backend
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        info!("Creating in-memory state backend");
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StateError::Backend(format!("Lock error: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StateError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StateError::Backend(format!("Lock error: {}", e)))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StateError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StateError::Backend(format!("Lock error: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}
